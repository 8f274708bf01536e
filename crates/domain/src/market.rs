//! The wired set of engines sharing one store, one set of ports and one
//! policy.

use event_store::EventStore;

use crate::ledger::Ledger;
use crate::negotiation::NegotiationEngine;
use crate::order::OrderEngine;
use crate::policy::MarketPolicy;
use crate::ports::MarketPorts;
use crate::withdrawal::WithdrawalEngine;

pub struct Market<S> {
    pub ledger: Ledger<S>,
    pub orders: OrderEngine<S>,
    pub negotiation: NegotiationEngine<S>,
    pub withdrawals: WithdrawalEngine<S>,
    ports: MarketPorts,
    policy: MarketPolicy,
}

impl<S: Clone> Clone for Market<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            orders: self.orders.clone(),
            negotiation: self.negotiation.clone(),
            withdrawals: self.withdrawals.clone(),
            ports: self.ports.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S: EventStore + Clone> Market<S> {
    pub fn new(store: S, ports: MarketPorts, policy: MarketPolicy) -> Self {
        let ledger = Ledger::new(store.clone(), ports.clone(), policy.clone());
        let orders = OrderEngine::new(
            store.clone(),
            ledger.clone(),
            ports.clone(),
            policy.clone(),
        );
        let negotiation = NegotiationEngine::new(
            store.clone(),
            orders.clone(),
            ports.clone(),
            policy.clone(),
        );
        let withdrawals =
            WithdrawalEngine::new(store, ledger.clone(), ports.clone(), policy.clone());

        Self {
            ledger,
            orders,
            negotiation,
            withdrawals,
            ports,
            policy,
        }
    }

    pub fn ports(&self) -> &MarketPorts {
        &self.ports
    }

    pub fn policy(&self) -> &MarketPolicy {
        &self.policy
    }
}
