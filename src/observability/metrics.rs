use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub open_orders: IntGauge,
    pub settlements_total: IntCounter,
    pub settled_amount_total: IntCounter,
    pub payout_requests_total: IntCounterVec,
    pub allowance_bags_consumed_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new(
                "order_transitions_total",
                "Order status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid order_transitions_total metric");

        let open_orders = IntGauge::new("open_orders", "Orders not yet in a terminal status")
            .expect("valid open_orders metric");

        let settlements_total =
            IntCounter::new("settlements_total", "Settlements written for completed orders")
                .expect("valid settlements_total metric");

        let settled_amount_total = IntCounter::new(
            "settled_amount_total",
            "Sum of all settlement amounts credited to couriers",
        )
        .expect("valid settled_amount_total metric");

        let payout_requests_total = IntCounterVec::new(
            Opts::new("payout_requests_total", "Payout request outcomes"),
            &["outcome"],
        )
        .expect("valid payout_requests_total metric");

        let allowance_bags_consumed_total = IntCounter::new(
            "allowance_bags_consumed_total",
            "Bags drawn from subscription allowances",
        )
        .expect("valid allowance_bags_consumed_total metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(open_orders.clone()))
            .expect("register open_orders");
        registry
            .register(Box::new(settlements_total.clone()))
            .expect("register settlements_total");
        registry
            .register(Box::new(settled_amount_total.clone()))
            .expect("register settled_amount_total");
        registry
            .register(Box::new(payout_requests_total.clone()))
            .expect("register payout_requests_total");
        registry
            .register(Box::new(allowance_bags_consumed_total.clone()))
            .expect("register allowance_bags_consumed_total");

        Self {
            registry,
            order_transitions_total,
            open_orders,
            settlements_total,
            settled_amount_total,
            payout_requests_total,
            allowance_bags_consumed_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
