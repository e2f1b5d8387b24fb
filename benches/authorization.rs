//! Permission evaluation benchmarks
//!
//! Run with: cargo bench --features=benchmarks

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use clinic_access::auth::{CacheConfig, Permission, PermissionService, Principal, Role};
use clinic_access::services::MockPermissionBackend;

const RESOURCES: [&str; 8] = [
    "patient", "appointment", "document", "invoice", "report", "prescription", "lab", "user",
];
const ACTIONS: [&str; 5] = ["read", "create", "update", "delete", "export"];

fn catalog() -> Vec<Permission> {
    let mut permissions = Vec::new();
    let mut id = 0;
    for resource in RESOURCES {
        for action in ACTIONS {
            id += 1;
            permissions.push(Permission::new(id, resource, action));
        }
    }
    permissions
}

fn service_with_role(granted: usize) -> PermissionService {
    let permissions = catalog();
    let role = Role::new(1, "Bench role", permissions.iter().take(granted).cloned().collect());
    let service = PermissionService::new(
        Arc::new(MockPermissionBackend::new(permissions)),
        CacheConfig::default(),
    );
    service.set_current_principal(Principal::with_role(1, role));
    service
}

fn bench_has_permission(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_permission");

    for granted in [5, 20, 40] {
        let service = service_with_role(granted);
        group.bench_with_input(BenchmarkId::new("granted", granted), &service, |b, service| {
            b.iter(|| black_box(service.has_permission(black_box("patient.read"))))
        });
        group.bench_with_input(BenchmarkId::new("denied", granted), &service, |b, service| {
            b.iter(|| black_box(service.has_permission(black_box("user.export"))))
        });
    }

    let superuser = service_with_role(0);
    superuser.set_current_principal(Principal::superuser(1, None));
    group.bench_function("superuser", |b| {
        b.iter(|| black_box(superuser.has_permission(black_box("invoice.delete"))))
    });

    group.finish();
}

fn bench_resource_queries(c: &mut Criterion) {
    let service = service_with_role(40);

    c.bench_function("accessible_resources", |b| {
        b.iter(|| black_box(service.accessible_resources()))
    });

    c.bench_function("resource_actions", |b| {
        b.iter(|| black_box(service.resource_actions(black_box("document"))))
    });

    c.bench_function("has_any_permission", |b| {
        let codes = ["lab.export", "user.delete", "patient.read"];
        b.iter(|| black_box(service.has_any_permission(codes)))
    });
}

fn bench_catalog_refresh(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = service_with_role(10);

    c.bench_function("invalidate_cache", |b| {
        b.to_async(&rt).iter(|| async {
            service.invalidate_cache().await;
            black_box(service.cache().len())
        })
    });
}

criterion_group!(
    benches,
    bench_has_permission,
    bench_resource_queries,
    bench_catalog_refresh
);
criterion_main!(benches);
