use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_lifecycle::backend::{BackendApi, HttpBackend, InMemoryBackend};
use order_lifecycle::config::AppConfig;
use order_lifecycle::domain::order::{
    ActorContext, ActorRole, NewOrder, Order, OrderCommand, OrderDispatcher, OrderError, OrderId,
    OrderItem,
};
use order_lifecycle::metrics::{start_metrics_server, DispatchMetrics};
use order_lifecycle::utils::InFlightRegistry;

#[derive(Parser)]
#[command(name = "orderctl", about = "Drive order lifecycle transitions against the storefront API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and print an order
    Show {
        #[arg(long)]
        order: String,
    },
    /// Seller confirms a pending order
    Confirm(ActorArgs),
    /// Seller records payment on a confirmed order
    MarkPaid(ActorArgs),
    /// Buyer completes a paid order
    Complete(ActorArgs),
    /// Cancel a pending or confirmed order
    Cancel {
        #[command(flatten)]
        actor: ActorArgs,
        #[arg(long)]
        reason: String,
    },
    /// Run the lifecycle scenarios against an in-memory backend
    Demo,
}

#[derive(Args)]
struct ActorArgs {
    #[arg(long)]
    order: String,
    /// buyer, seller or admin
    #[arg(long)]
    role: ActorRole,
    #[arg(long)]
    user: String,
}

impl ActorArgs {
    fn actor(&self) -> ActorContext {
        ActorContext::new(self.user.clone(), self.role)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_lifecycle=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let metrics = Arc::new(DispatchMetrics::new()?);
    if config.metrics.enabled {
        let server_metrics = metrics.clone();
        let port = config.metrics.port;
        std::thread::spawn(move || {
            let result = actix_web::rt::System::new()
                .block_on(start_metrics_server(server_metrics, port));
            if let Err(e) = result {
                tracing::error!("Metrics server error: {}", e);
            }
        });
        tracing::info!("📊 Metrics available on :{}/metrics", port);
    }

    let backend: Arc<dyn BackendApi> = match cli.command {
        Command::Demo => return run_demo(metrics).await,
        _ => Arc::new(HttpBackend::new(&config.backend)?.with_metrics(metrics.clone())),
    };
    let dispatcher = OrderDispatcher::new(backend).with_metrics(metrics);

    let (args, command) = match cli.command {
        Command::Show { order } => {
            let order = dispatcher.refresh(&OrderId::new(order)).await?;
            return print_order(&order);
        }
        Command::Confirm(args) => (args, OrderCommand::Confirm),
        Command::MarkPaid(args) => (args, OrderCommand::MarkPaid),
        Command::Complete(args) => (args, OrderCommand::Complete),
        Command::Cancel { actor, reason } => (actor, OrderCommand::cancel(&reason)?),
        Command::Demo => return Ok(()),
    };

    let order = dispatcher.refresh(&OrderId::new(args.order.clone())).await?;
    tracing::info!("📦 Order {} is {}", order.id(), order.status());

    let updated = dispatcher.dispatch(&order, &args.actor(), command).await?;
    tracing::info!("✅ Order {} is now {}", updated.id(), updated.status());

    print_order(&updated)
}

fn print_order(order: &Order) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(order).context("failed to serialize order")?;
    println!("{json}");
    Ok(())
}

async fn run_demo(metrics: Arc<DispatchMetrics>) -> anyhow::Result<()> {
    tracing::info!("🚀 Starting order lifecycle demo (in-memory backend)");

    let buyer = ActorContext::buyer("buyer-1");
    let seller = ActorContext::seller("seller-1");

    let items = vec![
        OrderItem::new("sku-shirt", Decimal::from(2), Decimal::from(15_000)),
        OrderItem::new("sku-fabric", Decimal::new(15, 1), Decimal::from(25_000)),
    ];
    let orders = (1..=4)
        .map(|n| {
            Order::create(NewOrder::new(format!("order-{n}"), "buyer-1", "seller-1", items.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let backend = Arc::new(InMemoryBackend::with_orders(orders.iter().cloned()));
    let dispatcher = OrderDispatcher::new(backend.clone())
        .with_metrics(metrics.clone())
        .with_in_flight_guard(InFlightRegistry::new());

    // === 1. Happy path: Pending -> Confirmed -> Paid -> Completed ===
    let order = &orders[0];
    tracing::info!("📝 {} created, total {}", order.id(), order.total_amount());
    let order = dispatcher.confirm(order, &seller).await?;
    let order = dispatcher.mark_paid(&order, &seller).await?;
    let completed = dispatcher.complete(&order, &buyer).await?;
    tracing::info!("✅ {} reached {}", completed.id(), completed.status());

    // === 2. Seller cancels a confirmed order ===
    let confirmed = dispatcher.confirm(&orders[1], &seller).await?;
    let cancelled = dispatcher.cancel(&confirmed, &seller, "Out of stock").await?;
    tracing::info!(
        "✅ {} cancelled: {}",
        cancelled.id(),
        cancelled.cancel_reason().map(|r| r.as_str()).unwrap_or_default()
    );

    // === 3. Rejected locally, backend never contacted ===
    let before = backend.calls();
    report("seller completes", dispatcher.complete(&orders[2], &seller).await);
    report("buyer cancels with 'No'", dispatcher.cancel(&orders[2], &buyer, "No").await);
    report("buyer confirms", dispatcher.confirm(&orders[2], &buyer).await);
    tracing::info!("🛡️ Backend calls for local rejections: {}", backend.calls() - before);

    // === 4. Stale snapshot: backend already moved on ===
    let stale = orders[3].clone();
    dispatcher.confirm(&stale, &seller).await?;
    report("cancel from stale snapshot", dispatcher.cancel(&stale, &buyer, "Changed my mind").await);
    let fresh = dispatcher.refresh(stale.id()).await?;
    tracing::info!("🔄 Refreshed {} is {}", fresh.id(), fresh.status());

    // === 5. Terminal state accepts nothing ===
    report("confirm a completed order", dispatcher.confirm(&completed, &seller).await);

    tracing::info!(
        "📊 Metrics registry holds {} families after {} backend calls",
        metrics.registry().gather().len(),
        backend.calls()
    );
    tracing::info!("🎉 Demo complete!");

    Ok(())
}

fn report(label: &str, result: Result<Order, OrderError>) {
    match result {
        Ok(order) => tracing::info!("✅ {}: {} is {}", label, order.id(), order.status()),
        Err(e) => tracing::info!("❌ {}: {} ({})", label, e, e.metric_label()),
    }
}
