mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chat_fiscal::api::{router, AppState, FISCAL_ENDPOINT, FUNCTION_KEY_HEADER};
use chat_fiscal::service::{BuildOptions, DatasetBuilder, QuestionGateway, TabularAgent};
use chat_fiscal::storage::{DatasetCache, FsBlobStore};
use common::{sample_archive, zip_of, CountingSource, StubAgent};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    app: Router,
    source: Arc<CountingSource>,
    agent: Arc<StubAgent>,
    _dir: tempfile::TempDir,
}

fn harness(archive: Vec<u8>, function_key: Option<&str>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(CountingSource::new(archive));
    let agent = Arc::new(StubAgent::new("Resposta final: 2 notas."));
    let cache = DatasetCache::new(Arc::new(FsBlobStore::new(dir.path())), "df_resultado.parquet");
    let builder = DatasetBuilder::new(source.clone(), BuildOptions::default());
    let tabular: Arc<dyn TabularAgent> = agent.clone();
    let gateway = Arc::new(QuestionGateway::new(builder, cache, tabular));

    let app = router(AppState {
        gateway,
        function_key: function_key.map(str::to_string),
    });
    Harness {
        app,
        source,
        agent,
        _dir: dir,
    }
}

fn ask(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(FISCAL_ENDPOINT)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn text_of(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn missing_question_is_400_without_building() {
    let h = harness(sample_archive(), None);

    for body in [r#"{}"#, r#"{"pergunta": "  "}"#, "não é json", r#"{"pergunta": 3}"#] {
        let response = h.app.clone().oneshot(ask(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(
            text_of(response).await,
            "Parâmetro 'pergunta' não encontrado no corpo da requisição"
        );
    }
    assert_eq!(h.source.fetches(), 0);
    assert!(h.agent.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn answer_is_returned_verbatim_and_cache_is_reused() {
    let h = harness(sample_archive(), None);

    for _ in 0..2 {
        let response = h
            .app
            .clone()
            .oneshot(ask(r#"{"pergunta": "Quantas notas existem?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text_of(response).await, "Resposta final: 2 notas.");
    }

    assert_eq!(h.source.fetches(), 1);
    let seen = h.agent.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(_, rows)| *rows == 3));
    assert!(seen[0].0.contains("access_key"));
}

#[tokio::test]
async fn build_failure_uses_error_template() {
    let broken = zip_of(&[("NFe_Itens.csv", common::ITEMS)]);
    let h = harness(broken, None);

    let response = h
        .app
        .clone()
        .oneshot(ask(r#"{"pergunta": "total?"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text_of(response)
        .await
        .starts_with("Erro ao processar a requisição: "));
}

#[tokio::test]
async fn function_key_is_enforced_when_configured() {
    let h = harness(sample_archive(), Some("segredo"));

    let response = h
        .app
        .clone()
        .oneshot(ask(r#"{"pergunta": "total?"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = ask(r#"{"pergunta": "total?"}"#);
    request
        .headers_mut()
        .insert(FUNCTION_KEY_HEADER, "segredo".parse().unwrap());
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(health).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_of(response).await, "OK");
}
