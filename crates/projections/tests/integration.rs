//! Integration tests: engine operations → ProjectionProcessor → views.

use chrono::Duration;
use common::{Caller, ListingId, Money, ProductId, SellerId, UserId};
use domain::ports::{InMemoryPorts, Listing, SellerProfile};
use domain::{
    AcceptOffer, CancelOrder, CreateNeed, LedgerEntry, Market, MarketPolicy, OrderStatus,
    PaymentMethod, SubmitOffer, TransactionType,
};
use event_store::InMemoryEventStore;
use projections::{OpenNeedsView, OrderBoardView, ProjectionProcessor};

const PRODUCT: &str = "airtime-20";

struct Setup {
    market: Market<InMemoryEventStore>,
    ports: InMemoryPorts,
    processor: ProjectionProcessor<InMemoryEventStore>,
    needs: OpenNeedsView,
    board: OrderBoardView,
}

fn setup() -> Setup {
    let store = InMemoryEventStore::new();
    let ports = InMemoryPorts::new();
    let market = Market::new(store.clone(), ports.ports(), MarketPolicy::default());

    let needs = OpenNeedsView::new();
    let board = OrderBoardView::new();
    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(needs.clone()));
    processor.register(Box::new(board.clone()));

    Setup {
        market,
        ports,
        processor,
        needs,
        board,
    }
}

async fn seller(s: &Setup) -> (SellerId, Caller) {
    let user_id = UserId::new();
    let seller_id = SellerId::new();
    s.ports.sellers.register(SellerProfile {
        seller_id,
        user_id,
        store_name: "Corner Shop".into(),
        approved: true,
    });
    s.ports.catalog.add_listing(Listing {
        listing_id: ListingId::new(),
        product_id: ProductId::from(PRODUCT),
        seller_id,
        price: Money::from_units(20),
        stock: 10,
        active: true,
    });
    let caller = Caller::seller(user_id);
    s.market
        .negotiation
        .set_presence(&caller, true)
        .await
        .unwrap();
    (seller_id, caller)
}

async fn funded_customer(s: &Setup, units: i64) -> Caller {
    let user_id = UserId::new();
    s.market
        .ledger
        .credit(LedgerEntry::new(
            user_id,
            Money::from_units(units),
            TransactionType::Deposit,
            "seed",
        ))
        .await
        .unwrap();
    Caller::customer(user_id)
}

#[tokio::test]
async fn accepted_need_moves_from_open_needs_to_the_board() {
    let s = setup();
    let (seller_id, seller) = seller(&s).await;
    let customer = funded_customer(&s, 100).await;

    let need_id = s
        .market
        .negotiation
        .create_need(&customer, CreateNeed::new(PRODUCT, "mtn", "0770000000", 2))
        .await
        .unwrap()
        .need_id()
        .unwrap();
    let offer = s
        .market
        .negotiation
        .submit_offer(&seller, SubmitOffer::new(need_id, Money::from_units(19)))
        .await
        .unwrap();

    s.processor.run_catch_up().await.unwrap();
    let open = s.needs.get(need_id).await.unwrap();
    assert_eq!(open.offer_count(), 1);
    assert_eq!(open.best_price(), Some(Money::from_units(19)));

    s.market
        .negotiation
        .accept_offer(
            &customer,
            AcceptOffer::new(need_id, offer.offer_id, PaymentMethod::Wallet),
        )
        .await
        .unwrap();
    s.processor.run_catch_up().await.unwrap();

    assert!(s.needs.get(need_id).await.is_none());
    let mine = s.board.for_customer(customer.user_id).await;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].total_amount, Money::from_units(38));
    assert_eq!(s.board.for_seller(seller_id).await.len(), 1);
}

#[tokio::test]
async fn board_tracks_cancellation() {
    let s = setup();
    let (_, seller) = seller(&s).await;
    let customer = funded_customer(&s, 100).await;

    let need_id = s
        .market
        .negotiation
        .create_need(&customer, CreateNeed::new(PRODUCT, "mtn", "0770000000", 1))
        .await
        .unwrap()
        .need_id()
        .unwrap();
    let offer = s
        .market
        .negotiation
        .submit_offer(&seller, SubmitOffer::new(need_id, Money::from_units(20)))
        .await
        .unwrap();
    let order_id = s
        .market
        .negotiation
        .accept_offer(
            &customer,
            AcceptOffer::new(need_id, offer.offer_id, PaymentMethod::Wallet),
        )
        .await
        .unwrap()
        .order
        .order_id()
        .unwrap();
    s.market
        .orders
        .cancel_order(&customer, CancelOrder::new(order_id, "typo in number"))
        .await
        .unwrap();

    s.processor.run_catch_up().await.unwrap();
    let summary = s.board.get(order_id).await.unwrap();
    assert_eq!(summary.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn lapsed_needs_are_due_until_expired() {
    let s = setup();
    let customer = funded_customer(&s, 10).await;

    let need_id = s
        .market
        .negotiation
        .create_need(&customer, CreateNeed::new(PRODUCT, "mtn", "0770000000", 1))
        .await
        .unwrap()
        .need_id()
        .unwrap();
    s.processor.run_catch_up().await.unwrap();

    let now = s.market.ports().clock.now();
    assert!(s.needs.due_for_expiry(now).await.is_empty());

    s.ports.clock.advance(Duration::minutes(30) + Duration::seconds(1));
    let now = s.market.ports().clock.now();
    assert_eq!(s.needs.due_for_expiry(now).await, vec![need_id]);

    s.market.negotiation.expire_stale(need_id).await.unwrap();
    s.processor.run_catch_up().await.unwrap();
    assert!(s.needs.due_for_expiry(now).await.is_empty());
    assert!(s.needs.get(need_id).await.is_none());
}

#[tokio::test]
async fn rebuild_reproduces_the_same_views() {
    let s = setup();
    let (_, seller) = seller(&s).await;
    let customer = funded_customer(&s, 100).await;

    for _ in 0..3 {
        let need_id = s
            .market
            .negotiation
            .create_need(&customer, CreateNeed::new(PRODUCT, "mtn", "0770000000", 1))
            .await
            .unwrap()
            .need_id()
            .unwrap();
        s.market
            .negotiation
            .submit_offer(&seller, SubmitOffer::new(need_id, Money::from_units(15)))
            .await
            .unwrap();
    }

    s.processor.run_catch_up().await.unwrap();
    let now = s.market.ports().clock.now();
    let by_id = |mut needs: Vec<projections::OpenNeedSummary>| {
        needs.sort_by_key(|n| n.need_id.to_string());
        needs
    };
    let before = by_id(s.needs.open_at(now).await);

    s.processor.rebuild_all().await.unwrap();
    assert_eq!(by_id(s.needs.open_at(now).await), before);
    assert_eq!(before.len(), 3);
}
