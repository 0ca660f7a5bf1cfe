use mockall::mock;
use onix_bap_engine::{
    protocol::{CanonicalEnvelope, ProtocolAction},
    traits::{BuyerProfile, ProfileLookup, ProfileLookupError},
    upstream::{UpstreamApi, UpstreamApiError},
};
use serde_json::Value;

mock! {
    pub Profiles {}
    impl ProfileLookup for Profiles {
        async fn find_verified_buyer(&self, subscriber_id: &str) -> Result<Option<BuyerProfile>, ProfileLookupError>;
    }
}

mock! {
    pub Upstream {}
    impl UpstreamApi for Upstream {
        async fn dispatch(&self, action: ProtocolAction, envelope: &CanonicalEnvelope) -> Result<Value, UpstreamApiError>;
    }
}
