//! Booking engine runtime.
//!
//! [`BookingRuntime`] owns the full lifecycle: database init, migrations,
//! availability index rebuild, booking and settlement services, the
//! expiry and no-show sweepers, metrics and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::application::{
    create_event_bus, AvailabilityIndex, BookingService, ExpiryScheduler, ExpirySweep,
    NoShowMonitor, NoShowSweep, SettlementHandler, SharedEventBus,
};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::{init_database, run_migrations, SeaOrmRepositoryProvider};
use crate::shared::{ShutdownCoordinator, ShutdownSignal, SystemClock};

/// Options for starting the engine.
pub struct RuntimeOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

/// Handle to a running booking engine.
pub struct BookingRuntime {
    pub booking: Arc<BookingService>,
    pub settlement: Arc<SettlementHandler>,
    pub repos: Arc<SeaOrmRepositoryProvider>,
    pub event_bus: SharedEventBus,
    pub config: AppConfig,

    db: DatabaseConnection,
    expiry: ExpiryScheduler,
    no_show: NoShowMonitor,
    shutdown: ShutdownCoordinator,
}

impl BookingRuntime {
    pub async fn start(opts: RuntimeOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let config = opts.config;
        config.validate()?;

        info!("Starting booking engine...");

        if config.metrics.enabled {
            install_metrics_exporter(&config.metrics.listen);
        }

        let db = init_database(&config.database_config()).await?;
        if opts.auto_migrate {
            run_migrations(&db).await?;
        }

        let repos = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
        let event_bus = create_event_bus(config.events.capacity);

        let index = Arc::new(AvailabilityIndex::new());
        index.rebuild(repos.reservations()).await?;

        let booking = Arc::new(BookingService::new(
            repos.clone(),
            index,
            event_bus.clone(),
            Arc::new(SystemClock),
            config.booking_policy(),
        ));

        let retry = config.retry_config();
        let settlement = Arc::new(SettlementHandler::new(booking.clone(), retry.clone()));

        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout_secs);
        let signal = shutdown.signal();

        let expiry = ExpiryScheduler::new(
            ExpirySweep::new(booking.clone(), retry.clone()),
            Duration::from_secs(config.scheduler.expiry_interval_secs),
        )
        .with_shutdown(signal.clone());
        let no_show = NoShowMonitor::new(
            NoShowSweep::new(booking.clone(), retry),
            Duration::from_secs(config.scheduler.no_show_interval_secs),
        )
        .with_shutdown(signal);

        expiry.start();
        no_show.start();

        info!("Booking engine started");

        Ok(Self {
            booking,
            settlement,
            repos,
            event_bus,
            config,
            db,
            expiry,
            no_show,
            shutdown,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for shutdown to be triggered, let the sweepers finish their
    /// current pass, then close the database.
    pub async fn wait(self) {
        let Self {
            db,
            expiry,
            no_show,
            shutdown,
            ..
        } = self;

        shutdown
            .shutdown_with_cleanup(|| async move {
                while expiry.is_running() || no_show.is_running() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                info!("Sweepers stopped");
            })
            .await;

        if let Err(e) = db.close().await {
            warn!(error = %e, "Error closing database connection");
        } else {
            info!("Database connection closed");
        }

        info!("Booking engine shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("Shutting down booking engine...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        self.expiry.is_running() || self.no_show.is_running()
    }
}

/// The global recorder can only be installed once per process.
fn install_metrics_exporter(listen: &str) {
    use std::sync::OnceLock;
    static INSTALLED: OnceLock<bool> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let addr: std::net::SocketAddr = match listen.parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(listen, error = %e, "Invalid metrics listen address");
                return false;
            }
        };

        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                info!(%addr, "Prometheus exporter listening");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to install Prometheus exporter");
                false
            }
        }
    });
}

/// Initialise tracing from the logging section. `RUST_LOG` wins over the
/// configured level.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BookingRequest, Connector, ConnectorPricing, ConnectorStandard, PaymentNotification,
        PaymentOutcome, ReservationStatus, TimeWindow, Vehicle,
    };

    fn memory_options() -> RuntimeOptions {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".into();
        config.database.max_connections = 1;
        config.server.shutdown_timeout_secs = 2;
        RuntimeOptions {
            config,
            auto_migrate: true,
        }
    }

    async fn seed(runtime: &BookingRuntime) {
        runtime
            .repos
            .connector_directory()
            .upsert(&Connector {
                id: "CN-1".into(),
                station_id: "ST-1".into(),
                standard: ConnectorStandard::Type2,
                max_power_kw: 22.0,
                pricing: ConnectorPricing {
                    price_per_kwh: 1_200,
                    price_per_minute: 0,
                    session_fee: 0,
                    currency: "UZS".into(),
                },
            })
            .await
            .unwrap();
        runtime
            .repos
            .vehicle_directory()
            .upsert(&Vehicle {
                id: "VH-1".into(),
                owner_id: "user-1".into(),
                label: None,
                supported_standards: vec![ConnectorStandard::Type2],
            })
            .await
            .unwrap();
    }

    fn tomorrow(hour_offset: i64) -> TimeWindow {
        let start = chrono::Utc::now()
            + chrono::Duration::days(1)
            + chrono::Duration::hours(hour_offset);
        TimeWindow::starting_at(start, 60).unwrap()
    }

    fn request(window: TimeWindow) -> BookingRequest {
        BookingRequest {
            user_id: "user-1".into(),
            vehicle_id: "VH-1".into(),
            station_id: "ST-1".into(),
            connector_id: "CN-1".into(),
            window,
        }
    }

    #[tokio::test]
    async fn books_and_settles_against_sqlite() {
        let runtime = BookingRuntime::start(memory_options()).await.unwrap();
        seed(&runtime).await;

        let receipt = runtime
            .booking
            .create_reservation(request(tomorrow(0)))
            .await
            .unwrap();
        let id = receipt.reservation.id;

        let outcome = runtime
            .settlement
            .on_payment_outcome(PaymentNotification {
                reservation_id: id,
                gateway_ref: "pay-1".into(),
                outcome: PaymentOutcome::Succeeded,
                amount: receipt.reservation.estimated_cost,
            })
            .await
            .unwrap();
        assert_eq!(outcome.reservation().status, ReservationStatus::Confirmed);

        let overlapping = runtime.booking.create_reservation(request(tomorrow(0))).await;
        assert!(overlapping.is_err());

        let log = runtime.booking.transition_log(id).await.unwrap();
        assert_eq!(log.len(), 2);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn rebuilt_index_sees_persisted_holds() {
        let runtime = BookingRuntime::start(memory_options()).await.unwrap();
        seed(&runtime).await;

        let window = tomorrow(3);
        runtime
            .booking
            .create_reservation(request(window))
            .await
            .unwrap();

        let index = AvailabilityIndex::new();
        let holds = index.rebuild(runtime.repos.reservations()).await.unwrap();
        assert_eq!(holds, 1);
        assert!(!index.is_available("CN-1", &window));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_sweepers() {
        let runtime = BookingRuntime::start(memory_options()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(runtime.is_running());

        let signal = runtime.shutdown_signal();
        runtime.shutdown().await;
        assert!(signal.is_triggered());
    }
}
