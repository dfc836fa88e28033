//! End-to-end pipeline test: replay a JSONL export, stage it, sync it into
//! the store, and query it back.

use std::fs::File;
use std::io::Write;

use tempfile::TempDir;
use tidings_core::BlurRules;
use tidings_ingest::source::JsonlSource;
use tidings_ingest::Extractor;
use tidings_store::{
    list, pending_batches, sync, BatchWriter, FeedTypes, ListParams, OrderBy, Store, SyncOptions,
};

fn feed_types() -> FeedTypes {
    FeedTypes {
        all: vec!["movie".to_string(), "episode".to_string()],
        has_scores: vec!["movie".to_string()],
    }
}

#[test]
fn test_extract_stage_sync_query() {
    let tmp = TempDir::new().unwrap();
    let staging = tmp.path().join("staging");

    // A small export: a scored movie with an image, and an episode.
    let export = tmp.path().join("trakt.jsonl");
    let mut file = File::create(&export).unwrap();
    writeln!(
        file,
        r#"{{"id":"trakt_up_2009_1","title":"Up","ftype":"movie","when":"2021-01-02T20:00:00+00:00","score":8.0,"image_url":"https://img.example/up.jpg"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"id":"trakt_ep_1","title":"Pilot","ftype":"episode","when":"2021-01-03T20:00:00+00:00","score":9.0,"subtitle":"Some Show"}}"#
    )
    .unwrap();
    drop(file);

    // Extract into a staging batch, blurring the movie by id.
    let mut extractor = Extractor::new(vec![Box::new(JsonlSource::new("trakt", &export))]);
    extractor.blur = Some(BlurRules::parse_str("id: *up_2009_*").unwrap());

    let mut writer = BatchWriter::create(&staging).unwrap();
    let stats = extractor
        .run(|item| {
            writer.write(&item)?;
            Ok(())
        })
        .unwrap();
    writer.finish().unwrap().unwrap();
    assert_eq!(stats.emitted, 2);
    assert_eq!(stats.blurred, 1);

    // Sync the batch into a fresh store.
    let mut store = Store::open(tmp.path().join("feed.sqlite")).unwrap();
    let report = sync(&mut store, &SyncOptions::new(&staging)).unwrap();
    assert_eq!(report.merged, 2);
    // The newest batch is retained for crash recovery.
    assert_eq!(pending_batches(&staging).unwrap().len(), 1);

    // Query back: newest first by default.
    let items = list(&store, &feed_types(), &ListParams::default()).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "trakt_ep_1");

    // The blur annotation survived staging and merge.
    let movie = items.iter().find(|i| i.id == "trakt_up_2009_1").unwrap();
    assert!(movie.flags.iter().any(|f| f == "i_blur"));

    // Score ranking excludes the episodic type despite its higher score.
    let ranked = list(
        &store,
        &feed_types(),
        &ListParams {
            order_by: OrderBy::Score,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].id, "trakt_up_2009_1");

    // Re-running the whole pipeline is a no-op thanks to id dedup.
    let report = sync(&mut store, &SyncOptions::new(&staging)).unwrap();
    assert_eq!(report.merged, 0);
    assert_eq!(store.count().unwrap(), 2);
}
