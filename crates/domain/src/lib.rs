//! Marketplace domain: negotiation, orders, the ledger and withdrawals.
//!
//! Every aggregate is event sourced. Operations that change more than one
//! aggregate stage all their events in a [`UnitOfWork`] and commit them
//! with a single expected-version guarded append, retrying from fresh
//! state when a concurrent writer wins.

mod access;
pub mod aggregate;
pub mod command;
pub mod error;
pub mod ledger;
pub mod market;
pub mod negotiation;
pub mod order;
pub mod policy;
pub mod ports;
pub mod retry;
pub mod unit_of_work;
pub mod withdrawal;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{CommandHandler, CommandResult};
pub use error::{DomainError, ErrorKind};
pub use ledger::{
    Ledger, LedgerEntry, LedgerError, PlatformCommission, SellerAccount, SettlementOutcome,
    TransactionLink, TransactionRecord, TransactionStatus, TransactionType, Wallet,
};
pub use market::Market;
pub use negotiation::{
    AcceptOffer, AcceptedOffer, CancelNeed, CreateNeed, ExpiryReport, Need, NeedError, NeedEvent,
    NeedStatus, NegotiationEngine, Offer, OfferStatus, SubmitOffer,
};
pub use order::{
    CancelOrder, CreateDirectOrder, Order, OrderEngine, OrderError, OrderEvent, OrderSource,
    OrderStatus, PaymentMethod, PaymentStatus,
};
pub use policy::MarketPolicy;
pub use ports::{
    CatalogLink, Clock, InMemoryPorts, MarketPorts, Notification, NotificationKind, Publisher,
    Recipient, SellerDirectory, SellerProfile,
};
pub use unit_of_work::UnitOfWork;
pub use withdrawal::{
    PayoutMethod, RequestWithdrawal, Withdrawal, WithdrawalDecision, WithdrawalEngine,
    WithdrawalError, WithdrawalEvent, WithdrawalStatus,
};
