use std::sync::Arc;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use warden_auth::{
    AuthContext, AuthMethod, AuthStrategy, BearerConfig, Credential, RequestAccessor,
    SimpleRequest, StrategyDispatcher,
};
use warden_core::{CallContext, Error, Result, UserId};

/// Claims every request; the last one registered succeeds.
struct Fixed {
    id: String,
    priority: i32,
    succeed: bool,
}

#[async_trait]
impl AuthStrategy for Fixed {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn extract(&self, request: &dyn RequestAccessor) -> Option<Credential> {
        request.header("Authorization").map(Credential::token)
    }

    async fn authenticate(&self, _ctx: &CallContext, _credential: Credential) -> Result<AuthContext> {
        if self.succeed {
            Ok(AuthContext::builder(UserId::new(), AuthMethod::BEARER).build())
        } else {
            Err(Error::SessionNotFound)
        }
    }
}

fn dispatcher_with(failing: usize) -> StrategyDispatcher {
    let mut dispatcher = StrategyDispatcher::new();
    for i in 0..failing {
        dispatcher
            .register(Arc::new(Fixed {
                id: format!("failing-{i}"),
                priority: i as i32,
                succeed: false,
            }))
            .unwrap();
    }
    dispatcher
        .register(Arc::new(Fixed {
            id: "winner".to_string(),
            priority: i32::MAX,
            succeed: true,
        }))
        .unwrap();
    dispatcher
}

fn bench_resolve_fallthrough(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_fallthrough");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let request = SimpleRequest::new().with_header("Authorization", "Bearer abc");

    for failing in [0usize, 1, 4, 16].iter() {
        group.bench_with_input(
            BenchmarkId::new("failing_before_success", failing),
            failing,
            |b, &failing| {
                let dispatcher = dispatcher_with(failing);
                let ctx = CallContext::new();
                b.iter(|| {
                    let resolution = runtime.block_on(dispatcher.resolve(&ctx, &request));
                    black_box(resolution.is_authenticated());
                });
            },
        );
    }

    group.finish();
}

fn bench_bearer_extraction(c: &mut Criterion) {
    let config = BearerConfig::default();
    c.bench_function("bearer_token_from", |b| {
        b.iter(|| black_box(config.token_from(black_box("bearer   some-opaque-session-token "))));
    });
}

criterion_group!(benches, bench_resolve_fallthrough, bench_bearer_extraction);
criterion_main!(benches);
