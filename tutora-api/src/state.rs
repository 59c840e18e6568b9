use std::sync::Arc;

use tutora_core::{CustomerStore, OtpStore};
use tutora_entitlement::{BookingAttacher, PurchaseReconciler};
use tutora_store::app_config::BusinessRules;
use tutora_store::{EventProducer, RedisClient};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CustomerStore>,
    pub otp: Arc<dyn OtpStore>,
    pub redis: Arc<RedisClient>,
    pub kafka: Arc<EventProducer>,
    pub reconciler: Arc<PurchaseReconciler>,
    pub attacher: Arc<BookingAttacher>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
