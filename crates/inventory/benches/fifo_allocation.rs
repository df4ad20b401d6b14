use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use stockflow_core::BusinessId;
use stockflow_inventory::{InventoryLot, ReceiveLot, plan_allocation};
use stockflow_products::ProductId;

fn make_lots(product_id: ProductId, count: usize) -> Vec<InventoryLot> {
    let business_id = BusinessId::new();
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            InventoryLot::receive(
                business_id,
                ReceiveLot {
                    product_id,
                    lot_number: format!("LOT-{i:06}"),
                    quantity: 10,
                    cost_per_unit: 100,
                    received_at: start + Duration::minutes(i as i64),
                    order_id: None,
                },
            )
            .unwrap()
        })
        .collect()
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_plan");

    for lot_count in [10usize, 100, 1_000, 10_000] {
        let product_id = ProductId::generate();
        let mut lots = make_lots(product_id, lot_count);
        // storage order is newest first so the sort does real work
        lots.reverse();
        let request = (lot_count as i64 * 10) / 2;

        group.throughput(Throughput::Elements(lot_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lot_count), &lots, |b, lots| {
            b.iter(|| {
                let plan = plan_allocation(product_id, black_box(lots), black_box(request)).unwrap();
                black_box(plan);
            });
        });
    }

    group.finish();
}

fn bench_plan_and_apply(c: &mut Criterion) {
    let product_id = ProductId::generate();
    let lots = make_lots(product_id, 1_000);

    c.bench_function("fifo_plan_and_apply_1000_lots", |b| {
        b.iter_batched(
            || lots.clone(),
            |mut lots| {
                let plan = plan_allocation(product_id, &lots, 2_500).unwrap();
                plan.apply(&mut lots).unwrap();
                black_box(lots);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_plan, bench_plan_and_apply);
criterion_main!(benches);
