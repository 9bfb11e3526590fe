//! Chrome-backed tests. They need a local Chrome/Chromium installation:
//!
//! ```sh
//! cargo test --test chrome_session_test -- --ignored
//! ```

mod common;

use common::ScriptedOracle;
use goal_driven_test::browser::ConnectionMode;
use goal_driven_test::config::SettleConfig;
use goal_driven_test::{
    AgentConfig, BrowserSession, ChromeDriver, ElementRegistry, GoalSession, Point, Termination, Viewport,
};
use std::time::Duration;
use test_server::TestServer;

async fn create_headless_driver() -> anyhow::Result<ChromeDriver> {
    ChromeDriver::new(ConnectionMode::Sandboxed {
        chrome_path: None,
        no_sandbox: true,
        headless: true,
    })
    .await
    .map_err(|e| anyhow::anyhow!("Failed to launch Chrome: {}", e))
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_enumerates_and_clicks_elements() -> anyhow::Result<()> {
    let server = TestServer::start().await;
    server.wait_ready().await?;

    let mut driver = create_headless_driver().await?;
    driver.set_viewport_size(800, 600).await?;
    driver.navigate(&server.url()).await?;

    assert_eq!(driver.viewport_size().await?, Viewport::new(800, 600));

    let registry = ElementRegistry::observe(&driver).await?;
    let kinds: Vec<&str> = registry.iter().map(|record| record.kind.as_str()).collect();
    assert_eq!(kinds, vec!["a", "button"]);

    let png = driver.screenshot().await?;
    assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);

    let (x, y) = registry.get(0).map(|record| record.center()).unwrap_or_default();
    driver.pointer_click(x, y).await?;
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(driver.current_url().await?.ends_with("/contact"));

    driver.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_scrolls_page_and_element() -> anyhow::Result<()> {
    let server = TestServer::start().await;
    server.wait_ready().await?;

    let mut driver = create_headless_driver().await?;
    driver.set_viewport_size(800, 600).await?;
    driver.navigate(&server.url()).await?;

    driver.scroll_from_origin(None, 0.0, 300.0).await?;
    assert_eq!(driver.execute_script("String(window.scrollY)").await?, "300");

    driver
        .scroll_from_origin(Some(Point::new(400.0, 300.0)), 0.0, -300.0)
        .await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(driver.execute_script("String(window.scrollY)").await?, "0");

    driver.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_goal_session_against_local_site() -> anyhow::Result<()> {
    let server = TestServer::start().await;
    server.wait_ready().await?;

    let driver = create_headless_driver().await?;
    let oracle = ScriptedOracle::new(vec![
        common::click_answer(1, false),
        common::click_answer(0, false),
        common::click_answer(0, true),
    ]);

    let mut config = AgentConfig::new(server.url(), "Find the opening hours");
    config.viewport = Viewport::new(800, 600);
    config.settle = SettleConfig::FixedDelay(Duration::from_millis(500));

    let outcome = GoalSession::new(config, Box::new(driver), Box::new(oracle))
        .run()
        .await;

    assert_eq!(outcome.termination, Termination::Achieved { steps: 3 });
    assert!(outcome.trajectory.steps()[2].url.ends_with("/contact"));
    Ok(())
}
