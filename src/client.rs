//! Power VS Client
//!
//! [`ClientSession`] is built in forward-only stages:
//!
//! `Unbound -> AccountOnly -> Authenticated -> RegionBound -> FullyBound`
//!
//! Each transition borrows the current snapshot and returns a new one, so a
//! failed step leaves the previous snapshot exactly as it was. A session may stop
//! at `AccountOnly` (minimal mode, account listings only) or go all the way to
//! `FullyBound`, where the [`Client`] resource operations become available.

use crate::config::Endpoints;
use crate::error::{Error, Result};
use crate::powervs::account::AccountSession;
use crate::powervs::auth::{AccessToken, Authenticator, IamAuthenticator};
use crate::powervs::identity::{ClaimsDecoder, Identity, UnverifiedClaimsDecoder, API_GENERATION};
use crate::powervs::models::{
    Images, Networks, PvmInstance, PvmInstanceCreate, PvmInstanceList, PvmInstanceReference,
    PvmInstances,
};
use crate::powervs::pcloud::{ImageClient, InstanceClient, NetworkClient};
use crate::powervs::region::{locate, RegionResolver, ResourceLocation, StaticRegionTable};
use crate::powervs::resource_controller::{ResourceControllerClient, ResourceInstance};
use crate::powervs::session::PowerSession;
use crate::secret::{get_api_key, ApiKey, SecretStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Timeout for long-running Power VS operations such as create and delete
pub const TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Scheme of provider ids handed to machine controllers
pub const PROVIDER_ID_SCHEME: &str = "ibmpowervs";

/// Render an instance id as a provider id, e.g. `ibmpowervs:///abc123`
pub fn format_provider_id(instance_id: &str) -> String {
    format!("{}:///{}", PROVIDER_ID_SCHEME, instance_id)
}

/// Resource operations available on a fully bound session
#[async_trait]
pub trait Client: Send + Sync {
    async fn get_images(&self) -> Result<Images>;
    async fn get_networks(&self) -> Result<Networks>;
    async fn delete_instance(&self, id: &str) -> Result<()>;
    async fn create_instance(&self, params: &PvmInstanceCreate) -> Result<PvmInstanceList>;
    async fn get_instance(&self, id: &str) -> Result<PvmInstance>;
    /// Returns [`Error::InstanceNotFound`] when no instance carries `name`
    async fn get_instance_by_name(&self, name: &str) -> Result<PvmInstance>;
    async fn get_instances(&self) -> Result<PvmInstances>;
    /// Power VS service instances of the account
    async fn get_cloud_service_instances(&self) -> Result<Vec<ResourceInstance>>;
}

/// First instance whose server name equals `name`
pub fn find_by_name<'a>(instances: &'a PvmInstances, name: &str) -> Option<&'a PvmInstanceReference> {
    instances.pvm_instances.iter().find(|i| i.server_name == name)
}

/// How far a [`ClientSession`] has been built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStage {
    #[default]
    Unbound,
    AccountOnly,
    Authenticated,
    RegionBound,
    FullyBound,
}

#[derive(Clone)]
struct BoundClients {
    session: Arc<PowerSession>,
    instances: InstanceClient,
    networks: NetworkClient,
    images: ImageClient,
}

/// Staged Power VS session
#[derive(Clone, Default)]
pub struct ClientSession {
    stage: SessionStage,
    account: Option<AccountSession>,
    token: Option<AccessToken>,
    identity: Option<Identity>,
    cloud_instance_id: Option<String>,
    location: Option<ResourceLocation>,
    bound: Option<BoundClients>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn account(&self) -> Option<&AccountSession> {
        self.account.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn location(&self) -> Option<&ResourceLocation> {
        self.location.as_ref()
    }

    pub fn cloud_instance_id(&self) -> Option<&str> {
        self.cloud_instance_id.as_deref()
    }

    pub fn power_session(&self) -> Option<&PowerSession> {
        self.bound.as_ref().map(|b| b.session.as_ref())
    }

    pub fn instances(&self) -> Option<&InstanceClient> {
        self.bound.as_ref().map(|b| &b.instances)
    }

    pub fn networks(&self) -> Option<&NetworkClient> {
        self.bound.as_ref().map(|b| &b.networks)
    }

    pub fn images(&self) -> Option<&ImageClient> {
        self.bound.as_ref().map(|b| &b.images)
    }

    fn expect_stage(&self, expected: SessionStage) -> Result<()> {
        if self.stage != expected {
            return Err(Error::Stage {
                expected,
                actual: self.stage,
            });
        }
        Ok(())
    }

    fn bound(&self) -> Result<&BoundClients> {
        self.bound.as_ref().ok_or(Error::Stage {
            expected: SessionStage::FullyBound,
            actual: self.stage,
        })
    }

    fn account_or_err(&self) -> Result<&AccountSession> {
        self.account.as_ref().ok_or(Error::Stage {
            expected: SessionStage::AccountOnly,
            actual: self.stage,
        })
    }

    /// `Unbound -> AccountOnly`
    pub fn attach_account(&self, account: AccountSession) -> Result<Self> {
        self.expect_stage(SessionStage::Unbound)?;
        Ok(Self {
            stage: SessionStage::AccountOnly,
            account: Some(account),
            ..self.clone()
        })
    }

    /// `AccountOnly -> Authenticated`: runs the token exchange
    pub async fn authenticate(&self) -> Result<Self> {
        self.expect_stage(SessionStage::AccountOnly)?;
        let token = self.account_or_err()?.authenticate().await?;
        tracing::info!("Authenticated with IAM");

        Ok(Self {
            stage: SessionStage::Authenticated,
            token: Some(token),
            ..self.clone()
        })
    }

    /// Decode the identity from the session token. Stays `Authenticated`.
    pub fn attach_identity(&self, decoder: &dyn ClaimsDecoder, api_generation: u32) -> Result<Self> {
        self.expect_stage(SessionStage::Authenticated)?;
        if self.identity.is_some() {
            return Ok(self.clone());
        }

        let token = self.token.as_ref().ok_or(Error::Stage {
            expected: SessionStage::Authenticated,
            actual: self.stage,
        })?;
        let identity = Identity::decode(decoder, token.as_str(), api_generation)?;
        tracing::info!("Identity resolved for account {}", identity.account);

        Ok(Self {
            identity: Some(identity),
            ..self.clone()
        })
    }

    /// `Authenticated -> RegionBound`: look up the cloud instance and its region
    pub async fn bind_region(
        &self,
        cloud_instance_id: &str,
        resolver: &dyn RegionResolver,
    ) -> Result<Self> {
        self.expect_stage(SessionStage::Authenticated)?;
        let resource = self
            .account_or_err()?
            .resource_instance(cloud_instance_id)
            .await?;
        let location = locate(resolver, &resource.region_id)?;
        tracing::info!(
            "Cloud instance {} is in zone {} (region {})",
            cloud_instance_id,
            location.zone,
            location.region
        );

        Ok(Self {
            stage: SessionStage::RegionBound,
            cloud_instance_id: Some(cloud_instance_id.to_string()),
            location: Some(location),
            ..self.clone()
        })
    }

    /// `RegionBound -> FullyBound`: open the Power session and its clients
    pub fn bind_session(&self, endpoints: &Endpoints, debug: bool) -> Result<Self> {
        self.expect_stage(SessionStage::RegionBound)?;
        let missing = |what: &str| Error::SessionBind(format!("no {} attached", what));
        let token = self.token.clone().ok_or_else(|| missing("access token"))?;
        let identity = self.identity.as_ref().ok_or_else(|| missing("identity"))?;
        let location = self.location.as_ref().ok_or_else(|| missing("location"))?;
        let cloud_instance_id = self
            .cloud_instance_id
            .as_deref()
            .ok_or_else(|| missing("cloud instance"))?;

        let session = Arc::new(PowerSession::new(
            token,
            location,
            &identity.account,
            endpoints,
            TIMEOUT,
            debug,
        )?);

        Ok(Self {
            stage: SessionStage::FullyBound,
            bound: Some(BoundClients {
                instances: InstanceClient::new(session.clone(), cloud_instance_id),
                networks: NetworkClient::new(session.clone(), cloud_instance_id),
                images: ImageClient::new(session.clone(), cloud_instance_id),
                session,
            }),
            ..self.clone()
        })
    }
}

#[async_trait]
impl Client for ClientSession {
    async fn get_images(&self) -> Result<Images> {
        self.bound()?.images.get_all().await
    }

    async fn get_networks(&self) -> Result<Networks> {
        self.bound()?.networks.get_all().await
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        self.bound()?.instances.delete(id).await
    }

    async fn create_instance(&self, params: &PvmInstanceCreate) -> Result<PvmInstanceList> {
        self.bound()?.instances.create(params).await
    }

    async fn get_instance(&self, id: &str) -> Result<PvmInstance> {
        self.bound()?.instances.get(id).await
    }

    async fn get_instance_by_name(&self, name: &str) -> Result<PvmInstance> {
        let bound = self.bound()?;
        let instances = bound.instances.get_all().await.map_err(|e| Error::Listing {
            what: "instance",
            source: Box::new(e),
        })?;

        match find_by_name(&instances, name) {
            Some(found) => bound.instances.get(&found.pvm_instance_id).await,
            None => Err(Error::InstanceNotFound),
        }
    }

    async fn get_instances(&self) -> Result<PvmInstances> {
        self.bound()?.instances.get_all().await
    }

    async fn get_cloud_service_instances(&self) -> Result<Vec<ResourceInstance>> {
        self.account_or_err()?.power_service_instances().await
    }
}

/// Builds sessions; collaborators can be swapped for testing or stricter checks
#[derive(Clone)]
pub struct Bootstrapper {
    endpoints: Endpoints,
    authenticator: Arc<dyn Authenticator>,
    resolver: Arc<dyn RegionResolver>,
    decoder: Arc<dyn ClaimsDecoder>,
    debug: bool,
}

impl Bootstrapper {
    /// Bootstrapper using IAM, the static region table and unverified claims
    pub fn new(endpoints: Endpoints) -> Result<Self> {
        Ok(Self {
            authenticator: Arc::new(IamAuthenticator::new(&endpoints.iam)?),
            resolver: Arc::new(StaticRegionTable),
            decoder: Arc::new(UnverifiedClaimsDecoder),
            endpoints,
            debug: false,
        })
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_region_resolver(mut self, resolver: Arc<dyn RegionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_claims_decoder(mut self, decoder: Arc<dyn ClaimsDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Log Power API response bodies (sanitized)
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn account_session(&self, api_key: ApiKey) -> Result<AccountSession> {
        let resources = ResourceControllerClient::new(&self.endpoints.resource_controller)?;
        Ok(AccountSession::new(api_key, self.authenticator.clone(), resources))
    }

    /// Account session only: no token exchange, no region binding
    pub fn minimal(&self, api_key: ApiKey) -> Result<ClientSession> {
        ClientSession::new().attach_account(self.account_session(api_key)?)
    }

    /// Every stage, ending `FullyBound` for `cloud_instance_id`
    pub async fn full(&self, api_key: ApiKey, cloud_instance_id: &str) -> Result<ClientSession> {
        let session = self.minimal(api_key)?;
        let session = session.authenticate().await?;
        let session = session.attach_identity(self.decoder.as_ref(), API_GENERATION)?;
        let session = session
            .bind_region(cloud_instance_id, self.resolver.as_ref())
            .await?;
        let session = session.bind_session(&self.endpoints, self.debug)?;

        tracing::info!("Power VS session ready for cloud instance {}", cloud_instance_id);
        Ok(session)
    }
}

/// Fully bound client from the API key stored in `namespace/secret_name`
pub async fn new_validated_client(
    store: &dyn SecretStore,
    secret_name: &str,
    namespace: &str,
    cloud_instance_id: &str,
    endpoints: Endpoints,
    debug: bool,
) -> Result<ClientSession> {
    let api_key = get_api_key(store, secret_name, namespace).await?;
    Bootstrapper::new(endpoints)?
        .with_debug(debug)
        .full(api_key, cloud_instance_id)
        .await
}

/// Minimal client for account-level queries
pub fn new_client_minimal(api_key: ApiKey, endpoints: Endpoints) -> Result<ClientSession> {
    Bootstrapper::new(endpoints)?.minimal(api_key)
}
