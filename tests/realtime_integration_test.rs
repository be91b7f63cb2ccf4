use portfolio_sync::curriculum::{
    CurriculumSelectionSource, RealtimeConfig, RealtimeSelectionClient,
};
use portfolio_sync::models::PortfolioKey;

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_read_selection_from_realtime_store() {
    dotenvy::dotenv().ok();

    let config = RealtimeConfig::new_from_env()
        .expect("Failed to load realtime config")
        .expect("SELECTION_BASE_URL is not set");
    let client = RealtimeSelectionClient::new(config).expect("Failed to create realtime client");

    let key = PortfolioKey::new(
        std::env::var("TEST_FAMILY_ID").unwrap_or_else(|_| "test-family".to_string()),
        std::env::var("TEST_STUDENT_ID").unwrap_or_else(|_| "test-student".to_string()),
        std::env::var("TEST_SCHOOL_YEAR").unwrap_or_else(|_| "2024-2025".to_string()),
    );

    let selection = client.read(&key).await.expect("Failed to read selection");
    println!("Selected courses for {}: {:?}", key, selection.flatten());
}
