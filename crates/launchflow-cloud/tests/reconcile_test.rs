mod common;

use common::*;
use launchflow_cloud::gateway::{CachePolicy, OriginProtocol, OriginSpec};
use launchflow_cloud::reconcile::{
    Context, bucket, certificate, cluster, distribution, dns, iam, load_balancer, logs, network,
    registry, service,
};
use launchflow_cloud::{
    ActionType, CloudError, ExposureMode, GatewayError, IamPolicySet, ManualClock, ResourceKind,
    ResourceNames, TracingReporter,
};
use std::fs;

/// Removes one resource from an account that already runs the app
type Removal = fn(&mut State);

fn count(calls: &[String], prefix: &str) -> usize {
    calls.iter().filter(|c| c.starts_with(prefix)).count()
}

/// Deploy everything, drop one resource, then redeploy without and with
/// permission to create it.
async fn assert_gated(kind: ResourceKind, remove: Removal, create_call: &str) {
    let h = Harness::new(FakeCloud::new().with_zone("example.com"));
    let mut desired = fargate_state(Some(ExposureMode::Production), true);
    h.deployer().deploy(&desired).await.unwrap();
    h.cloud.with(remove);
    h.cloud.clear_calls();

    desired.allow_create = false;
    match h.deployer().deploy(&desired).await {
        Err(CloudError::PermissionDenied { kind: denied, .. }) => {
            assert_eq!(denied, kind, "wrong kind refused");
        }
        other => panic!("{}: expected PermissionDenied, got {:?}", kind, other.map(|_| ())),
    }
    assert_eq!(
        h.cloud.unexpected_mutations(),
        Vec::<String>::new(),
        "{} mutated the account while refusing",
        kind
    );

    desired.allow_create = true;
    h.cloud.clear_calls();
    h.deployer().deploy(&desired).await.unwrap();
    assert_eq!(
        count(&h.cloud.calls(), create_call),
        1,
        "{}: {:#?}",
        kind,
        h.cloud.calls()
    );
}

#[tokio::test]
async fn test_every_kind_is_gated_on_allow_create() {
    let cases: [(ResourceKind, Removal, &str); 15] = [
        (
            ResourceKind::SecurityGroup,
            |s: &mut State| {
                s.groups.remove("demo-sg");
            },
            "create_security_group demo-sg",
        ),
        (
            ResourceKind::IamRole,
            |s: &mut State| s.roles.clear(),
            "create_role ecsTaskExecutionRole",
        ),
        (
            ResourceKind::LogSink,
            |s: &mut State| {
                s.log_groups.remove("/ecs/demo");
            },
            "create_log_group /ecs/demo",
        ),
        (
            ResourceKind::Registry,
            |s: &mut State| {
                s.repositories.remove("demo");
            },
            "create_repository demo",
        ),
        (
            ResourceKind::Cluster,
            |s: &mut State| {
                s.clusters.remove("demo-cluster");
            },
            "create_cluster demo-cluster",
        ),
        (
            ResourceKind::EventCapture,
            |s: &mut State| s.rules.clear(),
            "put_rule ecs-event-capture-demo-cluster",
        ),
        (
            ResourceKind::TaskDefinition,
            |s: &mut State| s.task_definitions.clear(),
            "register_task_definition demo-task",
        ),
        (
            ResourceKind::AlbSecurityGroup,
            |s: &mut State| {
                s.groups.remove("demo-alb-sg");
            },
            "create_security_group demo-alb-sg",
        ),
        (
            ResourceKind::LoadBalancer,
            |s: &mut State| {
                s.load_balancers.remove("demo-alb");
            },
            "create_load_balancer demo-alb",
        ),
        (
            ResourceKind::TargetGroup,
            |s: &mut State| {
                s.target_groups.remove("demo-tg");
            },
            "create_target_group demo-tg",
        ),
        (
            ResourceKind::Listener,
            |s: &mut State| s.listeners.clear(),
            "create_listener 80",
        ),
        (
            ResourceKind::Certificate,
            |s: &mut State| s.certificates.clear(),
            "request_certificate *.example.com",
        ),
        (
            ResourceKind::Distribution,
            |s: &mut State| s.distributions.clear(),
            "create_distribution app.example.com",
        ),
        (
            ResourceKind::DnsRecord,
            |s: &mut State| {
                for records in s.records.values_mut() {
                    records.retain(|r| r.name != "app.example.com.");
                }
            },
            "change_record Create A app.example.com",
        ),
        (
            ResourceKind::Service,
            |s: &mut State| s.services.clear(),
            "create_service demo-service",
        ),
    ];

    for (kind, remove, create_call) in cases {
        assert_gated(kind, remove, create_call).await;
    }
}

#[tokio::test]
async fn test_site_bucket_is_gated_on_allow_create() {
    let site = tempfile::tempdir().unwrap();
    fs::write(site.path().join("index.html"), "<h1>docs</h1>").unwrap();
    let h = Harness::new(FakeCloud::new());
    let mut desired = static_site_state(site.path(), None);

    desired.allow_create = false;
    let err = h.deployer().deploy(&desired).await.unwrap_err();
    assert!(matches!(
        err,
        CloudError::PermissionDenied {
            kind: ResourceKind::Bucket,
            ..
        }
    ));
    assert!(h.cloud.calls().is_empty());

    desired.allow_create = true;
    h.deployer().deploy(&desired).await.unwrap();
    assert_eq!(count(&h.cloud.calls(), "create_bucket docs-static-site"), 1);
}

/// Run a reconciler twice; the second pass must land on the same resource
/// without touching the account.
macro_rules! assert_idempotent {
    ($cloud:expr, $call:expr) => {{
        let first = $call.await.unwrap();
        $cloud.clear_calls();
        let second = $call.await.unwrap();
        assert_eq!(first.id, second.id, "{}", stringify!($call));
        assert_eq!(second.action, ActionType::NoOp, "{}", stringify!($call));
        assert_eq!(
            $cloud.unexpected_mutations(),
            Vec::<String>::new(),
            "{}",
            stringify!($call)
        );
        second
    }};
}

#[tokio::test]
async fn test_each_reconciler_is_idempotent() {
    let cloud = FakeCloud::new().with_zone("example.com");
    let clock = ManualClock::new();
    let ctx = Context::new(&cloud, &clock, &TracingReporter, true);
    let names = ResourceNames::for_app("demo");
    let policies = IamPolicySet::with_defaults();

    let net = assert_idempotent!(
        cloud,
        network::ensure_network(&ctx, &names, 8080, Some(ExposureMode::Production))
    );
    let vpc = net.attrs.vpc_id.clone();
    let role = assert_idempotent!(cloud, iam::ensure_execution_role(&ctx, &names, &policies));
    assert_idempotent!(cloud, logs::ensure_log_sink(&ctx, &names));
    assert_idempotent!(cloud, registry::ensure_repository(&ctx, &names));
    let cluster = assert_idempotent!(cloud, cluster::ensure_cluster(&ctx, &names));
    assert_idempotent!(
        cloud,
        logs::ensure_event_capture(&ctx, &names, &cluster.id, REGION, ACCOUNT)
    );

    let alb_group = assert_idempotent!(
        cloud,
        network::ensure_alb_security_group(&ctx, &names, &vpc)
    );
    let lb = assert_idempotent!(
        cloud,
        load_balancer::ensure_load_balancer(&ctx, &names, &net.attrs.subnet_ids, &alb_group.id)
    );
    let tg = assert_idempotent!(
        cloud,
        load_balancer::ensure_target_group(&ctx, &names, &vpc, 8080, "/health")
    );
    assert_idempotent!(cloud, load_balancer::ensure_listener(&ctx, &lb.id, &tg.id));

    let cert = assert_idempotent!(cloud, certificate::ensure_certificate(&ctx, "app.example.com"));
    let challenge = cert.attrs.validation_records[0].clone();
    let first = dns::ensure_validation_record(&ctx, &challenge)
        .await
        .unwrap()
        .unwrap();
    cloud.clear_calls();
    let second = dns::ensure_validation_record(&ctx, &challenge)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.action, ActionType::NoOp);
    assert!(cloud.calls().is_empty());

    let cdn = assert_idempotent!(
        cloud,
        distribution::ensure_distribution(
            &ctx,
            "app.example.com",
            OriginSpec::Custom {
                domain_name: lb.attrs.dns_name.clone(),
                protocol: OriginProtocol::HttpOnly,
            },
            CachePolicy::PassThrough,
            Some(&cert.id),
        )
    );
    let zone = cloud.zone_id("example.com").unwrap();
    assert_idempotent!(
        cloud,
        dns::upsert_cdn_alias(&ctx, &zone, "app.example.com", &cdn.attrs.domain_name)
    );
    assert_idempotent!(
        cloud,
        bucket::ensure_site_bucket(&ctx, "docs-static-site", REGION)
    );

    // Services always roll forward; the second pass updates in place.
    let desired = fargate_state(None, true);
    let first = service::ensure_service(
        &ctx,
        &desired,
        &role.id,
        &net.attrs.subnet_ids,
        vec![net.id.clone()],
        None,
    )
    .await
    .unwrap();
    cloud.clear_calls();
    let second = service::ensure_service(
        &ctx,
        &desired,
        &role.id,
        &net.attrs.subnet_ids,
        vec![net.id.clone()],
        None,
    )
    .await
    .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.action, ActionType::Update);
    assert_eq!(cloud.unexpected_mutations(), Vec::<String>::new());
}

#[tokio::test]
async fn test_missing_task_group_is_a_provider_error() {
    let cloud = FakeCloud::new();
    let clock = ManualClock::new();
    let ctx = Context::new(&cloud, &clock, &TracingReporter, true);
    let names = ResourceNames::for_app("demo");

    let err = network::allow_from_load_balancer(&ctx, VPC, &names, "sg-alb", 8080)
        .await
        .unwrap_err();

    match err {
        CloudError::Provider {
            source: GatewayError::NotFound(name),
            ..
        } => assert_eq!(name, "demo-sg"),
        other => panic!("expected a not-found provider error, got {:?}", other),
    }
    assert!(cloud.calls().is_empty());
}
