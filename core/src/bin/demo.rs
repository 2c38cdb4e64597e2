//! Walks through every operation against a real or mock service.
//!
//! Reads `LJ_LOGIN`, `LJ_PASSWORD` and optionally `LJ_ENDPOINT`, creates two
//! posts, edits one, fetches, then deletes both. Built with
//! `--features demo`.

use chrono::NaiveDate;
use ljposter_core::{ApiError, ClientConfig, LjPoster, PostDraft, PostResult};
use tracing_subscriber::EnvFilter;

fn print(label: &str, result: &PostResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{label}:\n{json}"),
        Err(e) => eprintln!("{label}: cannot render result: {e}"),
    }
}

fn run(poster: &LjPoster) -> Result<(), ApiError> {
    let feb17 = NaiveDate::from_ymd_opt(2022, 2, 17).and_then(|d| d.and_hms_opt(0, 0, 0));
    let feb18 = NaiveDate::from_ymd_opt(2022, 2, 18).and_then(|d| d.and_hms_opt(0, 0, 0));

    let mut draft1 = PostDraft::new("test1", "test1").tags(["tag1", "tag2"]);
    draft1.datetime = feb17;
    let post1 = poster.create_post(&draft1)?;
    print("created", &post1);

    let mut draft2 = PostDraft::new("test2", "test2")
        .tags(["tag1", "tag2"])
        .option("opt_nocomments", true)
        .option("opt_preformatted", true);
    draft2.datetime = feb17;
    let post2 = poster.create_post(&draft2)?;
    print("created", &post2);

    let missing = || ApiError::Deserialization("create response without itemid".to_string());
    let id1 = post1.item_id().ok_or_else(missing)?;
    let id2 = post2.item_id().ok_or_else(missing)?;

    let mut changed = PostDraft::new("test2_changed", "test2_changed").tags(["tag3", "tag4"]);
    changed.datetime = feb18;
    poster.edit_post(id2, &changed)?;

    print("by id", &poster.get_post_by_id(Some(id2))?);
    print("today", &poster.get_posts_for_date(None)?);
    print("last 2", &poster.get_last_n_posts(2, None)?);

    poster.delete_post(id1)?;
    poster.delete_post(id2)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let login = std::env::var("LJ_LOGIN")?;
    let password = std::env::var("LJ_PASSWORD")?;
    let mut config = ClientConfig::new(login, password);
    if let Ok(endpoint) = std::env::var("LJ_ENDPOINT") {
        config = config.with_endpoint(endpoint);
    }

    run(&LjPoster::new(config))?;
    Ok(())
}
