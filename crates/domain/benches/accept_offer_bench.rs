use common::{Caller, ListingId, Money, ProductId, SellerId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::ports::{InMemoryPorts, Listing, SellerProfile};
use domain::{
    AcceptOffer, CreateNeed, LedgerEntry, Market, MarketPolicy, PaymentMethod, SubmitOffer,
    TransactionType,
};
use event_store::InMemoryEventStore;

const PRODUCT: &str = "bench-airtime";

struct Fixture {
    market: Market<InMemoryEventStore>,
    customer: Caller,
    sellers: Vec<Caller>,
}

async fn fixture(sellers: usize) -> Fixture {
    let ports = InMemoryPorts::new();
    let market = Market::new(
        InMemoryEventStore::new(),
        ports.ports(),
        MarketPolicy::default(),
    );

    let mut callers = Vec::with_capacity(sellers);
    for n in 0..sellers {
        let user_id = UserId::new();
        let seller_id = SellerId::new();
        ports.sellers.register(SellerProfile {
            seller_id,
            user_id,
            store_name: format!("bench-{n}"),
            approved: true,
        });
        ports.catalog.add_listing(Listing {
            listing_id: ListingId::new(),
            product_id: ProductId::from(PRODUCT),
            seller_id,
            price: Money::from_units(100),
            stock: u32::MAX,
            active: true,
        });
        let caller = Caller::seller(user_id);
        market
            .negotiation
            .set_presence(&caller, true)
            .await
            .unwrap();
        callers.push(caller);
    }

    let customer = Caller::customer(UserId::new());
    market
        .ledger
        .credit(LedgerEntry::new(
            customer.user_id,
            Money::from_units(1_000_000_000),
            TransactionType::Deposit,
            "bench",
        ))
        .await
        .unwrap();

    Fixture {
        market,
        customer,
        sellers: callers,
    }
}

/// One full negotiation: need, one offer per seller, acceptance.
async fn negotiate(f: &Fixture) {
    let need = f
        .market
        .negotiation
        .create_need(&f.customer, CreateNeed::new(PRODUCT, "bench", "0700000000", 1))
        .await
        .unwrap();
    let need_id = need.need_id().unwrap();

    let mut last = None;
    for (n, seller) in f.sellers.iter().enumerate() {
        let offer = f
            .market
            .negotiation
            .submit_offer(
                seller,
                SubmitOffer::new(need_id, Money::from_units(100 - n as i64)),
            )
            .await
            .unwrap();
        last = Some(offer.offer_id);
    }

    f.market
        .negotiation
        .accept_offer(
            &f.customer,
            AcceptOffer::new(need_id, last.unwrap(), PaymentMethod::Wallet),
        )
        .await
        .unwrap();
}

fn bench_accept_offer(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("negotiation/accept_offer");

    for sellers in [1usize, 5, 20] {
        let f = rt.block_on(fixture(sellers));
        group.bench_function(format!("{sellers}_offers"), |b| {
            b.iter(|| rt.block_on(negotiate(&f)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_accept_offer);
criterion_main!(benches);
