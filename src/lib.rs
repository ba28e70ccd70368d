pub mod api_service;

pub use api_service::{
    ApiRequest, ApiResponse, ApiService, ApiServiceError, Callback, ClientOptions, Config,
    ExtraData, FileStorage, LogNotifier, LogRefreshHandler, MemoryStorage, Method, Notifier,
    RefreshHandler, RefreshTask, RequestData, RequestError, RequestErrorKind, RequestOptions,
    Settlement, Toast, ToastKind, TokenStorage, REFRESH_TRIGGERED_KEY,
};
