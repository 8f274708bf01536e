use chrono::{Duration, Utc};
use common::{Money, NeedId, OfferId, OrderId, ProductId, SellerId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::DomainEvent;
use domain::NeedEvent;
use domain::negotiation::{NeedCreatedData, OfferAcceptedData, OfferSubmittedData};
use event_store::{AppendOptions, EventEnvelope, EventStoreExt, InMemoryEventStore, Version};
use projections::{OpenNeedsView, ProjectionProcessor};

fn envelope(need_id: NeedId, version: i64, event: &NeedEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(need_id)
        .aggregate_type("Need")
        .event_type(event.event_type())
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

/// N negotiations of five events each: created, three offers, accepted.
async fn populate(store: &InMemoryEventStore, n: usize) {
    let now = Utc::now();
    for _ in 0..n {
        let need_id = NeedId::new();
        let mut events = vec![NeedEvent::NeedCreated(NeedCreatedData {
            need_id,
            customer_id: UserId::new(),
            product_id: ProductId::from("bench"),
            operator: "bench".into(),
            mobile: "0700000000".into(),
            quantity: 1,
            created_at: now,
            expires_at: now + Duration::minutes(30),
        })];
        let mut offers = Vec::new();
        for price in [30, 29, 28] {
            let offer_id = OfferId::new();
            offers.push(offer_id);
            events.push(NeedEvent::OfferSubmitted(OfferSubmittedData {
                need_id,
                offer_id,
                seller_id: SellerId::new(),
                price: Money::from_units(price),
                submitted_at: now,
                expires_at: now + Duration::minutes(30),
            }));
        }
        events.push(NeedEvent::OfferAccepted(OfferAcceptedData {
            need_id,
            offer_id: offers[2],
            order_id: OrderId::new(),
            rejected_offers: offers[..2].to_vec(),
            accepted_at: now,
        }));

        let envelopes = events
            .iter()
            .enumerate()
            .map(|(i, e)| envelope(need_id, i as i64 + 1, e))
            .collect();
        store
            .append(envelopes, AppendOptions::expect_new())
            .await
            .unwrap();
    }
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("projections/open_needs_catch_up");

    for needs in [100usize, 1000] {
        let store = InMemoryEventStore::new();
        rt.block_on(populate(&store, needs));

        group.bench_function(format!("{}_events", needs * 5), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let view = OpenNeedsView::new();
                    let mut processor = ProjectionProcessor::new(store.clone());
                    processor.register(Box::new(view));
                    processor.run_catch_up().await.unwrap();
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_catch_up);
criterion_main!(benches);
