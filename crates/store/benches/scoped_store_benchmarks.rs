//! Scoped store benchmarks: point reads and filtered lists under a
//! populated multi-project map.

use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use uuid::Uuid;

use procura_auth::{Role, TenantScope};
use procura_core::{OrganizationId, ProjectId, UserId};
use procura_store::{InMemoryScopedStore, ListQuery, ScopedStore, WriteOp};

const DOC: &str = "doc";
const PROJECTS: usize = 10;
const ROWS_PER_PROJECT: usize = 1_000;

fn scope_for(project_id: ProjectId) -> TenantScope {
    TenantScope::new(
        OrganizationId::new(),
        project_id,
        UserId::new(),
        Role::BUYER,
    )
}

fn populated() -> (InMemoryScopedStore, Vec<(TenantScope, Vec<Uuid>)>) {
    let store = InMemoryScopedStore::new();
    let mut scopes = Vec::with_capacity(PROJECTS);

    for _ in 0..PROJECTS {
        let scope = scope_for(ProjectId::new());
        let mut ids = Vec::with_capacity(ROWS_PER_PROJECT);

        for i in 0..ROWS_PER_PROJECT {
            let id = Uuid::now_v7();
            store
                .apply(
                    &scope,
                    vec![WriteOp::insert(
                        DOC,
                        id,
                        scope.project_id(),
                        Utc::now(),
                        json!({"status": if i % 5 == 0 { "open" } else { "closed" }, "n": i}),
                    )],
                )
                .expect("bench setup insert");
            ids.push(id);
        }

        scopes.push((scope, ids));
    }

    (store, scopes)
}

fn bench_get_by_id(c: &mut Criterion) {
    let (store, scopes) = populated();
    let (scope, ids) = &scopes[PROJECTS / 2];
    let id = ids[ROWS_PER_PROJECT / 2];

    c.bench_function("scoped_get_by_id", |b| {
        b.iter(|| {
            let row = store
                .get(black_box(scope), DOC, black_box(id), false)
                .expect("get");
            black_box(row)
        })
    });
}

fn bench_filtered_list(c: &mut Criterion) {
    let (store, scopes) = populated();
    let (scope, _) = &scopes[0];
    let query = ListQuery::new().with_filter("status", "open").with_limit(50);

    c.bench_function("scoped_list_filtered", |b| {
        b.iter(|| {
            let rows = store
                .list(black_box(scope), DOC, black_box(&query))
                .expect("list");
            black_box(rows)
        })
    });
}

criterion_group!(benches, bench_get_by_id, bench_filtered_list);
criterion_main!(benches);
