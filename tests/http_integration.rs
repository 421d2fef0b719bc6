//! Integration tests for session bootstrap and the resource operations using wiremock
//!
//! IAM, the resource controller and the Power Cloud API are all served by one
//! mock server, so every test drives the real HTTP paths end to end.

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use powervs_client::config::Endpoints;
use powervs_client::powervs::auth::{AccessToken, Authenticator, IamAuthenticator};
use powervs_client::powervs::identity::UnverifiedClaimsDecoder;
use powervs_client::powervs::models::PvmInstanceCreate;
use powervs_client::powervs::region::{RegionResolver, StaticRegionTable};
use powervs_client::powervs::resource_controller::ResourceControllerClient;
use powervs_client::secret::{ApiKey, DirectorySecretStore};
use powervs_client::{new_validated_client, Bootstrapper, Client, Error, SessionStage};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLOUD_INSTANCE_ID: &str = "4f2a7c1e-1111-2222-3333-444455556666";
const ACCOUNT: &str = "acct-42";

fn access_token() -> String {
    encode(
        &Header::default(),
        &json!({
            "id": "IBMid-123",
            "email": "dev@example.com",
            "account": {"bss": ACCOUNT},
            "iss": "https://iam.cloud.ibm.com/identity",
        }),
        &EncodingKey::from_secret(b"not-checked"),
    )
    .unwrap()
}

fn power_crn(zone: &str) -> String {
    format!(
        "crn:v1:bluemix:public:power-iaas:{}:a/{}:{}::",
        zone, ACCOUNT, CLOUD_INSTANCE_ID
    )
}

fn resource_instance(service: &str, guid: &str, region_id: &str) -> Value {
    let crn = format!("crn:v1:bluemix:public:{}:{}:a/{}:{}::", service, region_id, ACCOUNT, guid);
    json!({
        "id": crn,
        "guid": guid,
        "crn": crn,
        "name": format!("{}-{}", service, guid),
        "region_id": region_id,
        "state": "active",
        "type": "service_instance",
    })
}

fn instances_path() -> String {
    format!("/pcloud/v1/cloud-instances/{}/pvm-instances", CLOUD_INSTANCE_ID)
}

struct Counting<T> {
    inner: T,
    calls: AtomicUsize,
}

impl<T> Counting<T> {
    fn new(inner: T) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for Counting<IamAuthenticator> {
    async fn authenticate(&self, api_key: &ApiKey) -> powervs_client::Result<AccessToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.authenticate(api_key).await
    }
}

impl RegionResolver for Counting<StaticRegionTable> {
    fn resolve(&self, raw_region_id: &str) -> powervs_client::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(raw_region_id)
    }
}

fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints {
        iam: server.uri(),
        resource_controller: server.uri(),
        power: Some(server.uri()),
    }
}

async fn mount_iam(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .and(body_string_contains("apikey=test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token(),
            "refresh_token": "refresh",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .mount(server)
        .await;
}

async fn mount_resource_instance(server: &MockServer, region_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/resource_instances/{}", CLOUD_INSTANCE_ID)))
        .and(bearer_token(access_token()))
        .respond_with(ResponseTemplate::new(200).set_body_json(resource_instance(
            "power-iaas",
            CLOUD_INSTANCE_ID,
            region_id,
        )))
        .mount(server)
        .await;
}

/// Mock server ready for a full bootstrap in zone lon04
async fn bootstrap_server() -> MockServer {
    let server = MockServer::start().await;
    mount_iam(&server).await;
    mount_resource_instance(&server, "lon04").await;
    server
}

async fn full_session(server: &MockServer) -> powervs_client::ClientSession {
    Bootstrapper::new(endpoints(server))
        .unwrap()
        .full(ApiKey::new("test-key"), CLOUD_INSTANCE_ID)
        .await
        .expect("bootstrap should succeed")
}

mod bootstrap_tests {
    use super::*;

    /// Full bootstrap walks every stage and binds lon04 to region lon
    #[tokio::test]
    async fn test_full_bootstrap_is_fully_bound() {
        let server = bootstrap_server().await;
        let session = full_session(&server).await;

        assert_eq!(session.stage(), SessionStage::FullyBound);
        let identity = session.identity().unwrap();
        assert_eq!(identity.account, ACCOUNT);
        assert_eq!(identity.email.as_deref(), Some("dev@example.com"));
        assert_eq!(identity.api_generation, 2);

        let location = session.location().unwrap();
        assert_eq!(location.region, "lon");
        assert_eq!(location.zone, "lon04");
        assert_eq!(session.cloud_instance_id(), Some(CLOUD_INSTANCE_ID));
        assert!(session.instances().is_some());
        assert!(session.networks().is_some());
        assert!(session.images().is_some());
        assert_eq!(
            session.power_session().unwrap().crn(CLOUD_INSTANCE_ID),
            power_crn("lon04")
        );
    }

    /// Minimal bootstrap never exchanges the key nor resolves a region
    #[tokio::test]
    async fn test_minimal_bootstrap_skips_auth_and_region() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let auth = Counting::new(IamAuthenticator::new(&server.uri()).unwrap());
        let resolver = Counting::new(StaticRegionTable);
        let session = Bootstrapper::new(endpoints(&server))
            .unwrap()
            .with_authenticator(auth.clone())
            .with_region_resolver(resolver.clone())
            .minimal(ApiKey::new("test-key"))
            .unwrap();

        assert_eq!(session.stage(), SessionStage::AccountOnly);
        assert!(session.identity().is_none());
        assert!(session.location().is_none());
        assert!(session.instances().is_none());
        assert_eq!(auth.calls(), 0);
        assert_eq!(resolver.calls(), 0);
    }

    /// Unknown zone fails the bootstrap and leaves nothing bound
    #[tokio::test]
    async fn test_region_failure_binds_nothing() {
        let server = MockServer::start().await;
        mount_iam(&server).await;
        mount_resource_instance(&server, "mars01").await;

        let bootstrapper = Bootstrapper::new(endpoints(&server)).unwrap();
        let err = bootstrapper
            .full(ApiKey::new("test-key"), CLOUD_INSTANCE_ID)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownRegion(ref zone) if zone == "mars01"));

        // Step by step: the snapshot before the failing stage stays untouched
        let authed = bootstrapper
            .minimal(ApiKey::new("test-key"))
            .unwrap()
            .authenticate()
            .await
            .unwrap()
            .attach_identity(&UnverifiedClaimsDecoder, 2)
            .unwrap();
        let err = authed
            .bind_region(CLOUD_INSTANCE_ID, &StaticRegionTable)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::UnknownRegion(_)));
        assert_eq!(authed.stage(), SessionStage::Authenticated);
        assert!(authed.location().is_none());
        assert!(authed.power_session().is_none());
        assert!(authed.instances().is_none());
        assert!(authed.networks().is_none());
        assert!(authed.images().is_none());
    }

    /// A rejected API key surfaces as an authentication error
    #[tokio::test]
    async fn test_rejected_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errorCode": "BXNIM0415E",
                "errorMessage": "Provided API key could not be found",
            })))
            .mount(&server)
            .await;

        let err = Bootstrapper::new(endpoints(&server))
            .unwrap()
            .full(ApiKey::new("bad-key"), CLOUD_INSTANCE_ID)
            .await
            .err()
            .unwrap();

        match err {
            Error::Authentication(msg) => assert!(msg.contains("could not be found")),
            other => panic!("unexpected error: {other}"),
        }
    }

    /// A missing cloud instance is a provider error, passed through
    #[tokio::test]
    async fn test_missing_cloud_instance() {
        let server = MockServer::start().await;
        mount_iam(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/resource_instances/{}", CLOUD_INSTANCE_ID)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errors": [{"code": "not_found", "message": "Instance not found"}]
            })))
            .mount(&server)
            .await;

        let err = Bootstrapper::new(endpoints(&server))
            .unwrap()
            .full(ApiKey::new("test-key"), CLOUD_INSTANCE_ID)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(404));
    }

    /// Missing secret is reported apart from other failures
    #[tokio::test]
    async fn test_validated_client_missing_secret() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectorySecretStore::new(tmp.path());

        let err = new_validated_client(
            &store,
            "powervs-credentials",
            "openshift-machine-api",
            CLOUD_INSTANCE_ID,
            Endpoints::default(),
            false,
        )
        .await
        .err()
        .unwrap();
        assert!(err.is_secret_not_found());
    }

    /// Secret on disk drives the whole bootstrap
    #[tokio::test]
    async fn test_validated_client_from_secret() {
        let server = bootstrap_server().await;
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("openshift-machine-api").join("powervs-credentials");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ibmcloud_api_key"), "test-key").unwrap();

        let session = new_validated_client(
            &DirectorySecretStore::new(tmp.path()),
            "powervs-credentials",
            "openshift-machine-api",
            CLOUD_INSTANCE_ID,
            endpoints(&server),
            true,
        )
        .await
        .unwrap();
        assert_eq!(session.stage(), SessionStage::FullyBound);
    }
}

mod facade_tests {
    use super::*;

    async fn mount_listing(server: &MockServer, names: &[&str]) {
        let items: Vec<Value> = names
            .iter()
            .map(|n| json!({"pvmInstanceID": format!("id-{}", n), "serverName": n, "status": "ACTIVE"}))
            .collect();
        Mock::given(method("GET"))
            .and(path(instances_path()))
            .and(header("CRN", power_crn("lon04").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pvmInstances": items})))
            .mount(server)
            .await;
    }

    /// Name lookup lists, matches, then fetches the full instance
    #[tokio::test]
    async fn test_get_instance_by_name() {
        let server = bootstrap_server().await;
        mount_listing(&server, &["a", "b", "c"]).await;
        Mock::given(method("GET"))
            .and(path(format!("{}/id-b", instances_path())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pvmInstanceID": "id-b",
                "serverName": "b",
                "status": "SHUTOFF",
                "processors": 1,
                "memory": 4,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = full_session(&server).await;
        let instance = session.get_instance_by_name("b").await.unwrap();
        assert_eq!(instance.server_name, "b");
        assert_eq!(instance.pvm_instance_id, "id-b");

        let err = session.get_instance_by_name("z").await.unwrap_err();
        assert!(err.is_instance_not_found());
    }

    /// An empty listing is a miss, not a transport failure
    #[tokio::test]
    async fn test_get_instance_by_name_empty_listing() {
        let server = bootstrap_server().await;
        mount_listing(&server, &[]).await;

        let session = full_session(&server).await;
        let err = session.get_instance_by_name("a").await.unwrap_err();
        assert!(err.is_instance_not_found());
    }

    /// A failed listing is reported as such
    #[tokio::test]
    async fn test_get_instance_by_name_listing_failure() {
        let server = bootstrap_server().await;
        Mock::given(method("GET"))
            .and(path(instances_path()))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let session = full_session(&server).await;
        let err = session.get_instance_by_name("a").await.unwrap_err();
        assert!(matches!(err, Error::Listing { what: "instance", .. }));
        assert!(!err.is_instance_not_found());
    }

    /// Deleting a missing instance surfaces the provider's answer
    #[tokio::test]
    async fn test_delete_passes_provider_error_through() {
        let server = bootstrap_server().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/gone", instances_path())))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "description": "pvm-instance does not exist",
                "error": "pvm-instance not found",
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/id-a", instances_path())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let session = full_session(&server).await;
        session.delete_instance("id-a").await.unwrap();

        let err = session.delete_instance("gone").await.unwrap_err();
        match err {
            Error::Provider { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "pvm-instance does not exist");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Create posts the body and returns the created list
    #[tokio::test]
    async fn test_create_instance() {
        let server = bootstrap_server().await;
        Mock::given(method("POST"))
            .and(path(instances_path()))
            .and(body_partial_json(json!({"serverName": "worker-0", "imageID": "img-1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {"pvmInstanceID": "new-1", "serverName": "worker-0", "status": "BUILD"}
            ])))
            .mount(&server)
            .await;

        let session = full_session(&server).await;
        let created = session
            .create_instance(&PvmInstanceCreate {
                server_name: "worker-0".into(),
                image_id: "img-1".into(),
                processors: 0.5,
                memory: 8.0,
                proc_type: "shared".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].pvm_instance_id, "new-1");
    }

    /// Empty network list is fine; a body-less reply is not
    #[tokio::test]
    async fn test_networks_empty_vs_missing_payload() {
        let server = bootstrap_server().await;
        let networks_path = format!("/pcloud/v1/cloud-instances/{}/networks", CLOUD_INSTANCE_ID);
        Mock::given(method("GET"))
            .and(path(networks_path.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(networks_path))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let session = full_session(&server).await;
        let networks = session.get_networks().await.unwrap();
        assert!(networks.networks.is_empty());

        let err = session.get_networks().await.unwrap_err();
        assert!(matches!(err, Error::EmptyPayload("networks")));
    }

    /// Images are listed as returned
    #[tokio::test]
    async fn test_get_images() {
        let server = bootstrap_server().await;
        Mock::given(method("GET"))
            .and(path(format!("/pcloud/v1/cloud-instances/{}/images", CLOUD_INSTANCE_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [
                    {"imageID": "img-1", "name": "rhcos-414", "state": "active"},
                    {"imageID": "img-2", "name": "centos-stream", "state": "active"}
                ]
            })))
            .mount(&server)
            .await;

        let session = full_session(&server).await;
        let images = session.get_images().await.unwrap();
        let names: Vec<_> = images.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["rhcos-414", "centos-stream"]);
    }

    /// Minimal session lists service instances, keeps Power ones, follows pages
    #[tokio::test]
    async fn test_cloud_service_instances_from_minimal_session() {
        let server = MockServer::start().await;
        mount_iam(&server).await;
        Mock::given(method("GET"))
            .and(path("/v2/resource_instances"))
            .and(query_param("type", "service_instance"))
            .and(query_param("start", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [resource_instance("power-iaas", "p2", "tok04")],
                "next_url": null,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/resource_instances"))
            .and(query_param("type", "service_instance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [
                    resource_instance("power-iaas", "p1", "lon04"),
                    resource_instance("cloud-object-storage", "cos", "global"),
                ],
                "next_url": "/v2/resource_instances?type=service_instance&start=page2",
            })))
            .mount(&server)
            .await;

        let auth = Counting::new(IamAuthenticator::new(&server.uri()).unwrap());
        let session = Bootstrapper::new(endpoints(&server))
            .unwrap()
            .with_authenticator(auth.clone())
            .minimal(ApiKey::new("test-key"))
            .unwrap();
        assert_eq!(auth.calls(), 0);

        let instances = session.get_cloud_service_instances().await.unwrap();
        let guids: Vec<_> = instances.iter().map(|i| i.guid.as_str()).collect();
        assert_eq!(guids, vec!["p1", "p2"]);
        assert!(instances.iter().all(|i| i.crn.service_name == "power-iaas"));

        // token is cached after the first lazy exchange
        session.get_cloud_service_instances().await.unwrap();
        assert_eq!(auth.calls(), 1);
    }

    /// Listing failure is wrapped with context
    #[tokio::test]
    async fn test_cloud_service_instances_failure() {
        let server = MockServer::start().await;
        mount_iam(&server).await;
        Mock::given(method("GET"))
            .and(path("/v2/resource_instances"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let session = Bootstrapper::new(endpoints(&server))
            .unwrap()
            .minimal(ApiKey::new("test-key"))
            .unwrap();
        let err = session.get_cloud_service_instances().await.unwrap_err();
        assert!(err.to_string().starts_with("failed to get the service instance list"));
    }
}

mod account_call_tests {
    use super::*;

    /// A stalled token endpoint fails the exchange instead of hanging
    #[tokio::test]
    async fn test_token_exchange_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": access_token()}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let auth = IamAuthenticator::with_timeout(&server.uri(), Duration::from_millis(200)).unwrap();
        let err = auth.authenticate(&ApiKey::new("test-key")).await.unwrap_err();

        assert!(matches!(err, Error::Authentication(_)), "unexpected error: {err}");
    }

    /// A stalled resource controller surfaces a transport timeout
    #[tokio::test]
    async fn test_resource_controller_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/resource_instances/{}", CLOUD_INSTANCE_ID)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(resource_instance("power-iaas", CLOUD_INSTANCE_ID, "lon04"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client =
            ResourceControllerClient::with_timeout(&server.uri(), Duration::from_millis(200)).unwrap();
        let err = client
            .get_instance("Bearer t", CLOUD_INSTANCE_ID)
            .await
            .unwrap_err();

        match err {
            Error::Transport(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
    }

    /// A listing that never stops paginating is an error, not a partial result
    #[tokio::test]
    async fn test_endless_pagination_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/resource_instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [resource_instance("power-iaas", "p1", "lon04")],
                "next_url": "/v2/resource_instances?type=service_instance&start=again",
            })))
            .expect(100)
            .mount(&server)
            .await;

        let client = ResourceControllerClient::new(&server.uri()).unwrap();
        let err = client
            .list_instances("Bearer t", "service_instance")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PageLimit(100)), "unexpected error: {err}");
    }
}
