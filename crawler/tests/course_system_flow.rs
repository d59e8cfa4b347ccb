use crawler::parse::BROKEN_STATE_MARKER;
use crawler::{CourseAvailability, CourseSystemClient, CrawlerConfig, CrawlerError, NtnuSession};
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::time::Duration;

const ACCOUNT: &str = "40947030S";
const MAGIC: &str = "magic42";

const LOGIN_SCRIPT: &str = "Ext.Ajax.request({\n  url:'LoginCheckCtrl?action=login&id=' + 'magic42',\n});";
const LANDING_PAGE: &str =
    "{\r\n  xtype: 'hidden',\r\n  name: 'stdName',\r\n  value: '王小明'\r\n}";

fn config(site: &ServerGuard, captcha: &ServerGuard) -> CrawlerConfig {
    CrawlerConfig::new(ACCOUNT, "password")
        .with_base_url(site.url())
        .with_captcha_url(captcha.url())
        .with_retry_delay(Duration::ZERO)
        .with_api_retry(1)
        .with_captcha_retry(3)
}

fn url_encoded(key: &str, value: &str) -> Matcher {
    Matcher::UrlEncoded(key.to_string(), value.to_string())
}

async fn mock_captcha(captcha: &mut ServerGuard, candidates: &str) -> Mock {
    captcha
        .mock("POST", "/solve")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"response": {}}}"#, candidates))
        .create_async()
        .await
}

/// Pages up to and including the login form post
async fn mock_login(site: &mut ServerGuard, result: &str, hits: usize) -> (Mock, Mock, Mock) {
    let magic = site
        .mock("GET", "/AasEnrollStudent/LoginCheckCtrl")
        .with_status(200)
        .with_body(LOGIN_SCRIPT)
        .create_async()
        .await;
    let image = site
        .mock("GET", "/AasEnrollStudent/RandImage")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body([0x89u8, 0x50, 0x4e, 0x47, 0xff, 0xfe])
        .create_async()
        .await;
    let login = site
        .mock("POST", "/AasEnrollStudent/LoginCheckCtrl")
        .match_query(Matcher::AllOf(vec![
            url_encoded("action", "login"),
            url_encoded("id", MAGIC),
        ]))
        .match_body(Matcher::AllOf(vec![
            url_encoded("userid", ACCOUNT),
            url_encoded("validateCode", "7"),
            url_encoded("checkTW", "1"),
        ]))
        .with_status(200)
        .with_body(result)
        .expect(hits)
        .create_async()
        .await;
    (magic, image, login)
}

/// Pages between a successful login and the course query page
async fn mock_landing(site: &mut ServerGuard) -> Vec<Mock> {
    let mut mocks = Vec::new();
    mocks.push(
        site.mock("GET", "/AasEnrollStudent/IndexCtrl")
            .match_query(url_encoded("language", "TW"))
            .with_status(200)
            .with_body(LANDING_PAGE)
            .create_async()
            .await,
    );
    mocks.push(
        site.mock("POST", "/AasEnrollStudent/LoginCtrl")
            .match_body(Matcher::AllOf(vec![
                url_encoded("userid", ACCOUNT),
                url_encoded("stdName", "王小明"),
            ]))
            .with_status(200)
            .create_async()
            .await,
    );
    mocks.push(
        site.mock("GET", "/AasEnrollStudent/EnrollCtrl")
            .match_query(url_encoded("action", "go"))
            .with_status(200)
            .with_body("<html>enroll</html>")
            .create_async()
            .await,
    );
    mocks.push(
        site.mock("GET", "/AasEnrollStudent/CourseQueryCtrl")
            .match_query(url_encoded("action", "query"))
            .with_status(200)
            .with_body("<html>query</html>")
            .create_async()
            .await,
    );
    mocks
}

async fn mock_query(site: &mut ServerGuard, serial: &str, body: &str, hits: usize) -> Mock {
    site.mock("POST", "/AasEnrollStudent/CourseQueryCtrl")
        .match_body(Matcher::AllOf(vec![
            url_encoded("serialNo", serial),
            url_encoded("notFull", "1"),
            url_encoded("action", "showGrid"),
        ]))
        .with_status(200)
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn test_query_after_login() {
    let mut site = Server::new_async().await;
    let mut captcha = Server::new_async().await;
    let _solve = mock_captcha(&mut captcha, r#"["abc", "3+4"]"#).await;
    let (_magic, _image, login) = mock_login(&mut site, "{success:true}", 1).await;
    let _landing = mock_landing(&mut site).await;
    let _open = mock_query(&mut site, "1234", r#"{"Count":1,"List":[]}"#, 1).await;
    let _full = mock_query(&mut site, "5678", r#"{"Count":0,"List":[]}"#, 1).await;

    let mut client = CourseSystemClient::new(config(&site, &captcha)).unwrap();
    assert!(!client.is_initialized());

    assert!(client.has_vacancy("1234").await.unwrap());
    assert!(!client.has_vacancy("5678").await.unwrap());
    assert!(client.is_initialized());

    login.assert_async().await;
}

#[tokio::test]
async fn test_login_gives_up_after_captcha_retries() {
    let mut site = Server::new_async().await;
    let mut captcha = Server::new_async().await;
    let _solve = mock_captcha(&mut captcha, r#"["3+4"]"#).await;
    let (_magic, _image, login) = mock_login(&mut site, "{success:false}", 3).await;

    let mut session = NtnuSession::new(config(&site, &captcha)).unwrap();
    let result = session.login().await;
    assert!(matches!(
        result,
        Err(CrawlerError::LoginExhausted { attempts: 3 })
    ));

    login.assert_async().await;
}

#[tokio::test]
async fn test_captcha_service_failure_aborts_login() {
    let mut site = Server::new_async().await;
    let mut captcha = Server::new_async().await;
    let _solve = captcha
        .mock("POST", "/solve")
        .with_status(500)
        .create_async()
        .await;
    let (_magic, _image, login) = mock_login(&mut site, "{success:true}", 0).await;

    let mut session = NtnuSession::new(config(&site, &captcha)).unwrap();
    let result = session.login().await;
    assert!(matches!(result, Err(CrawlerError::Captcha(_))));

    login.assert_async().await;
}

#[tokio::test]
async fn test_broken_state_reinitialises_then_fails() {
    let mut site = Server::new_async().await;
    let mut captcha = Server::new_async().await;
    let _solve = mock_captcha(&mut captcha, r#"["3+4"]"#).await;
    let (_magic, _image, login) = mock_login(&mut site, "{success:true}", 2).await;
    let _landing = mock_landing(&mut site).await;
    let broken = format!("<script>alert('{}')</script>", BROKEN_STATE_MARKER);
    let _query = mock_query(&mut site, "1234", &broken, 2).await;

    let mut client = CourseSystemClient::new(config(&site, &captcha)).unwrap();
    let result = client.has_vacancy("1234").await;
    assert!(matches!(result, Err(CrawlerError::BrokenState)));
    assert!(!client.is_initialized());

    login.assert_async().await;
}

#[tokio::test]
async fn test_empty_query_responses_are_retried() {
    let mut site = Server::new_async().await;
    let captcha = Server::new_async().await;
    let query = mock_query(&mut site, "1234", "", 2).await;

    let session = NtnuSession::new(config(&site, &captcha)).unwrap();
    let result = session.query_count("1234").await;
    assert!(matches!(
        result,
        Err(CrawlerError::QueryExhausted { attempts: 2, .. })
    ));

    query.assert_async().await;
}

#[tokio::test]
async fn test_unreadable_captcha_resets_and_retries() {
    let mut site = Server::new_async().await;
    let mut captcha = Server::new_async().await;
    let solve = captcha
        .mock("POST", "/solve")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response": []}"#)
        .expect(3)
        .create_async()
        .await;
    let (_magic, _image, login) = mock_login(&mut site, "{success:true}", 0).await;

    let mut session = NtnuSession::new(config(&site, &captcha)).unwrap();
    let result = session.login().await;
    assert!(matches!(
        result,
        Err(CrawlerError::LoginExhausted { attempts: 3 })
    ));

    solve.assert_async().await;
    login.assert_async().await;
}

#[tokio::test]
async fn test_transport_errors_are_retried() {
    // Nothing listens on a port just released by the OS
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let unreachable = format!("http://127.0.0.1:{}", port);
    let delay = Duration::from_millis(50);
    let config = CrawlerConfig::new(ACCOUNT, "password")
        .with_base_url(unreachable.clone())
        .with_captcha_url(unreachable)
        .with_retry_delay(delay)
        .with_api_retry(1);

    let session = NtnuSession::new(config).unwrap();
    let started = std::time::Instant::now();
    let result = session.query_count("1234").await;

    assert!(matches!(result, Err(CrawlerError::Network(_))));
    // One delay between the first and the second attempt
    assert!(started.elapsed() >= delay);
}
