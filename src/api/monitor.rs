use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    constants::RECENT_TRANSACTIONS_LIMIT,
    db::MonitorStore,
    error::Result,
    models::{ApiResponse, DetectedTransaction, MonitorRunState, WatchedAddress},
    services::{
        scheduler::{SchedulerStatus, StartOutcome, StopOutcome},
        PassReport,
    },
};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartMonitorRequest {
    /// Minutes between passes.
    pub interval: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartMonitorResponse {
    pub status: StartOutcome,
    pub interval_minutes: u64,
}

#[derive(Debug, Serialize)]
pub struct StopMonitorResponse {
    pub status: StopOutcome,
}

#[derive(Debug, Serialize)]
pub struct MonitorStatusResponse {
    pub scheduler: SchedulerStatus,
    pub last_run: Option<MonitorRunState>,
}

#[derive(Debug, Serialize)]
pub struct MonitorDataResponse {
    pub addresses: Vec<WatchedAddress>,
    pub transactions: Vec<DetectedTransaction>,
}

// Watch-list plus the most recent detections, newest block first.
async fn load_monitor_data(store: &dyn MonitorStore) -> Result<MonitorDataResponse> {
    Ok(MonitorDataResponse {
        addresses: store.list_addresses().await?,
        transactions: store.recent_transactions(RECENT_TRANSACTIONS_LIMIT).await?,
    })
}

/// POST /api/v1/monitor/start
pub async fn start_monitor(
    State(state): State<AppState>,
    req: Option<Json<StartMonitorRequest>>,
) -> Result<Json<ApiResponse<StartMonitorResponse>>> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let interval_minutes = req
        .interval
        .unwrap_or(state.config.monitor_interval_minutes);

    let status = state.scheduler.start(interval_minutes).await?;
    let interval_minutes = state
        .scheduler
        .status()
        .await
        .interval_minutes
        .unwrap_or(interval_minutes);

    Ok(Json(ApiResponse::success(StartMonitorResponse {
        status,
        interval_minutes,
    })))
}

/// POST /api/v1/monitor/stop
pub async fn stop_monitor(State(state): State<AppState>) -> Json<ApiResponse<StopMonitorResponse>> {
    let status = state.scheduler.stop().await;
    Json(ApiResponse::success(StopMonitorResponse { status }))
}

/// POST /api/v1/monitor/refresh
pub async fn refresh_monitor(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PassReport>>> {
    let report = state.scheduler.run_now().await?;
    Ok(Json(ApiResponse::success(report)))
}

/// GET /api/v1/monitor/status
pub async fn get_monitor_status(
    State(state): State<AppState>,
) -> Json<ApiResponse<MonitorStatusResponse>> {
    let scheduler = state.scheduler.status().await;
    let last_run = match state.db.get_run_state().await {
        Ok(run_state) => run_state,
        Err(e) => {
            tracing::warn!("Monitor state unavailable: {}", e);
            None
        }
    };

    Json(ApiResponse::success(MonitorStatusResponse {
        scheduler,
        last_run,
    }))
}

/// GET /api/v1/monitor/data
pub async fn get_monitor_data(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MonitorDataResponse>>> {
    let data = load_monitor_data(&state.db).await?;
    Ok(Json(ApiResponse::success(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::MemoryStore;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn detected(seed: char, block_height: i64) -> DetectedTransaction {
        DetectedTransaction {
            chain: "bitcoin".to_string(),
            from_address: "1a1zp1ep5qgefi2dmptftl5slmv7divfna".to_string(),
            to_address: "3j98t1wpez73cnmqviecrnyiwrnqrhwnly".to_string(),
            amount: Decimal::ONE,
            token_name: "BTC".to_string(),
            tx_hash: std::iter::repeat(seed).take(64).collect(),
            block_height,
            destination_label: "Unknown".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn start_twice_then_stop() {
        let state = crate::api::test_state(Arc::new(MemoryStore::default()));

        let Json(first) = start_monitor(
            State(state.clone()),
            Some(Json(StartMonitorRequest { interval: Some(3) })),
        )
        .await
        .unwrap();
        assert_eq!(first.data.status, StartOutcome::Started);
        assert_eq!(first.data.interval_minutes, 3);

        // Second start keeps the running interval
        let Json(second) = start_monitor(State(state.clone()), None).await.unwrap();
        assert_eq!(second.data.status, StartOutcome::AlreadyRunning);
        assert_eq!(second.data.interval_minutes, 3);

        let Json(stopped) = stop_monitor(State(state.clone())).await;
        assert_eq!(stopped.data.status, StopOutcome::Stopped);
        let Json(again) = stop_monitor(State(state)).await;
        assert_eq!(again.data.status, StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn start_defaults_to_configured_interval() {
        let state = crate::api::test_state(Arc::new(MemoryStore::default()));
        let Json(res) = start_monitor(State(state.clone()), None).await.unwrap();
        assert_eq!(res.data.interval_minutes, state.config.monitor_interval_minutes);
        stop_monitor(State(state)).await;
    }

    #[tokio::test]
    async fn start_rejects_zero_interval() {
        let state = crate::api::test_state(Arc::new(MemoryStore::default()));
        let result = start_monitor(
            State(state),
            Some(Json(StartMonitorRequest { interval: Some(0) })),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn refresh_returns_pass_report() {
        let state = crate::api::test_state(Arc::new(MemoryStore::default()));
        let Json(res) = refresh_monitor(State(state)).await.unwrap();
        assert!(res.success);
        assert_eq!(res.data, PassReport::default());
    }

    #[tokio::test]
    async fn status_survives_unreachable_database() {
        let state = crate::api::test_state(Arc::new(MemoryStore::default()));
        let Json(res) = get_monitor_status(State(state)).await;
        assert!(!res.data.scheduler.running);
        assert!(res.data.last_run.is_none());
    }

    #[tokio::test]
    async fn data_lists_latest_transactions_first() {
        let store = MemoryStore::default().with_address(
            "1a1zp1ep5qgefi2dmptftl5slmv7divfna",
            "bitcoin",
            105,
        );
        {
            let mut txs = store.transactions.lock().unwrap();
            for (i, seed) in "abcdefghijkl".chars().enumerate() {
                txs.push(detected(seed, 100 + i as i64));
            }
        }

        let data = load_monitor_data(&store).await.unwrap();
        assert_eq!(data.addresses.len(), 1);
        assert_eq!(data.transactions.len(), RECENT_TRANSACTIONS_LIMIT as usize);
        assert_eq!(data.transactions[0].block_height, 111);
        assert!(data
            .transactions
            .windows(2)
            .all(|w| w[0].block_height >= w[1].block_height));
    }

    #[test]
    fn start_request_interval_is_optional() {
        let req: StartMonitorRequest = serde_json::from_str("{}").unwrap();
        assert!(req.interval.is_none());
        let req: StartMonitorRequest = serde_json::from_str(r#"{"interval":15}"#).unwrap();
        assert_eq!(req.interval, Some(15));
    }
}
