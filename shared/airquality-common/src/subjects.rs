/// JetStream stream holding inbound subscription changes.
pub const SUBSCRIPTION_STREAM: &str = "AIRQUALITY_SUBSCRIPTIONS";

/// Wildcard covering every subscription subject.
pub const SUBSCRIPTION_SUBJECTS: &str = "airquality.subscriptions.>";

/// Carries a [`crate::SubscribeRequestV1`].
pub const SUBSCRIPTION_UPSERT_SUBJECT: &str = "airquality.subscriptions.upsert";

/// Carries an [`crate::UnsubscribeRequestV1`].
pub const SUBSCRIPTION_DELETE_SUBJECT: &str = "airquality.subscriptions.delete";

/// Redis hash holding one JSON-encoded subscription per owner id.
pub const SUBSCRIPTIONS_HASH_KEY: &str = "airquality:subscriptions";
