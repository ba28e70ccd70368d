use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;

use crate::api_service::errors::RequestError;
use crate::api_service::request::{ExtraData, RequestData, RequestOptions, ValidatedCall};
use crate::api_service::response::ApiResponse;
use crate::api_service::storage::TokenStorage;
use crate::api_service::{ApiService, Settlement};

/// Receives the outcome of a background refresh call
///
/// This is where newly issued tokens get persisted. The service itself
/// does not know the shape of the refresh response, so the default
/// implementation only logs.
#[async_trait::async_trait]
pub trait RefreshHandler: Send + Sync {
    async fn on_refreshed(&self, response: &ApiResponse, _storage: &dyn TokenStorage) {
        log::debug!(
            "Token refresh succeeded with status {}; no persistence configured",
            response.status
        );
    }

    async fn on_refresh_failed(&self, error: &RequestError) {
        log::warn!("Token refresh failed: {}", error);
    }
}

/// Default handler: logs and drops the outcome
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRefreshHandler;

#[async_trait::async_trait]
impl RefreshHandler for LogRefreshHandler {}

/// Handle to a refresh running in the background
///
/// Dropping it detaches the task; the refresh still runs to completion.
#[derive(Debug)]
pub struct RefreshTask {
    handle: JoinHandle<Settlement>,
}

impl RefreshTask {
    /// Wait for the refresh call to settle. `None` if the task panicked or
    /// was aborted.
    pub async fn outcome(self) -> Option<Settlement> {
        match self.handle.await {
            Ok(settlement) => Some(settlement),
            Err(e) => {
                log::warn!("Token refresh task did not complete: {}", e);
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Start the refresh procedure on a new tokio task
pub(crate) fn spawn_refresh(service: ApiService) -> RefreshTask {
    RefreshTask {
        handle: tokio::spawn(refresh_future(service)),
    }
}

fn refresh_future(service: ApiService) -> BoxFuture<'static, Settlement> {
    async move {
        let handler = Arc::clone(&service.refresh_handler);

        let settlement = service.settle(refresh_call(&service)).await;
        match &settlement {
            Settlement::Success { response } => {
                handler
                    .on_refreshed(response, service.storage.as_ref())
                    .await
            }
            Settlement::Failure { error, .. } => handler.on_refresh_failed(error).await,
        }
        settlement
    }
    .boxed()
}

/// The refresh request: only the refresh-token header, client secret on,
/// no nested refresh, and the access token dropped if the refresh fails.
/// The token itself is read while the request is prepared, so a storage
/// failure settles like any other failure.
fn refresh_call(service: &ApiService) -> ValidatedCall {
    let refresh = &service.config.refresh_token;

    ValidatedCall {
        url: refresh.url.clone(),
        method: refresh.method,
        on_success: Arc::new(|response: &ApiResponse, _: Option<&ExtraData>| {
            log::debug!("Refresh call returned status {}", response.status);
        }),
        on_fail: Arc::new(|_: &RequestError, _: &ExtraData| {}),
        extra_data: None,
        data: RequestData::default(),
        options: RequestOptions {
            delete_access_token_after_fail: true,
            use_client_secret: true,
            disable_refresh_token: true,
            ..RequestOptions::default()
        },
        send_refresh_token: true,
    }
}
