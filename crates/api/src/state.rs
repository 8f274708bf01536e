//! Shared state handed to every handler.

use common::{Caller, Role};
use domain::{DomainError, Market, MarketPolicy, MarketPorts, SellerProfile};
use event_store::EventStore;
use projections::{OpenNeedsView, OrderBoardView, ProjectionProcessor};

use crate::error::ApiError;

pub struct AppState<S: EventStore> {
    pub market: Market<S>,
    pub open_needs: OpenNeedsView,
    pub order_board: OrderBoardView,
    pub projections: ProjectionProcessor<S>,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    /// Wires the engines and registers both read models against `store`.
    pub fn new(store: S, ports: MarketPorts, policy: MarketPolicy) -> Self {
        let market = Market::new(store.clone(), ports, policy);
        let open_needs = OpenNeedsView::new();
        let order_board = OrderBoardView::new();

        let mut projections = ProjectionProcessor::new(store);
        projections.register(Box::new(open_needs.clone()));
        projections.register(Box::new(order_board.clone()));

        Self {
            market,
            open_needs,
            order_board,
            projections,
        }
    }

    /// Brings the read models up to date with the log.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.projections.run_catch_up().await?;
        Ok(())
    }

    /// The seller profile behind a seller caller.
    pub async fn seller_for(&self, caller: &Caller) -> Result<SellerProfile, ApiError> {
        if caller.blocked {
            return Err(DomainError::forbidden("caller is blocked").into());
        }
        if caller.role != Role::Seller {
            return Err(DomainError::forbidden("only sellers may do this").into());
        }
        self.market
            .ports()
            .sellers
            .seller_for_user(caller.user_id)
            .await
            .map_err(DomainError::from)?
            .ok_or_else(|| DomainError::forbidden("no seller profile for this user").into())
    }
}
