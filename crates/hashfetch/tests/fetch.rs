mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use hashfetch::{ArtifactKind, Error, ExpectedKind, RegistryEntry, ResolutionError, StaticRegistry};

const FILE_URL: &str = "https://example.com/logo.png";
const APP_URL: &str = "https://example.com/app.zip";

#[tokio::test]
async fn cached_artifact_skips_registry_and_network() {
    let body = b"already here";
    let hash = hash_of(body);
    let h = harness(StaticRegistry::new(), FakeHttp::default());

    h.engine.initialize().await.unwrap();
    write_file(&h.engine.store().file_path(&hash), body);

    let path = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap();
    assert_eq!(path, h.root().join("files").join(hash.as_str()));
    assert_eq!(h.registry.calls(), 0);
    assert_eq!(h.http.request_count(), 0);
}

#[tokio::test]
async fn direct_file_is_downloaded_verified_and_cached() {
    let body = b"\x89PNG not really".to_vec();
    let hash = hash_of(&body);
    let http = FakeHttp::default();
    http.serve(FILE_URL, body.clone());
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL)), http);

    let path = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), body);
    assert!(!h.engine.store().partial_path(&hash).exists());
    assert_eq!(h.http.requests(), vec![FILE_URL.to_string()]);

    // Second call is a cache hit.
    h.engine.fetch(&hash, ExpectedKind::File).await.unwrap();
    assert_eq!(h.http.request_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fetches_share_one_download() {
    let body = b"shared bytes".to_vec();
    let hash = hash_of(&body);
    let http = FakeHttp::with_delay(Duration::from_millis(50));
    http.serve(FILE_URL, body);
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL)), http);

    let calls = (0..8).map(|_| {
        let engine = h.engine.clone();
        let hash = hash.clone();
        tokio::spawn(async move { engine.fetch(&hash, ExpectedKind::File).await })
    });
    let results = futures_util::future::join_all(calls).await;

    let expected = h.engine.store().file_path(&hash);
    for result in results {
        assert_eq!(result.unwrap().unwrap(), expected);
    }
    assert_eq!(h.http.request_count(), 1);
    assert_eq!(h.registry.calls(), 1);
}

#[tokio::test]
async fn oversized_download_is_aborted_and_recorded() {
    let body = vec![0u8; 64];
    let hash = hash_of(&body);
    let http = FakeHttp::default();
    http.serve(FILE_URL, body);
    let h = harness_with(StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL)), http, |o| {
        o.max_download_size(32)
    });

    let err = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap_err();
    assert!(matches!(err, Error::SizeExceeded { limit: 32, .. }), "{err}");
    assert!(!h.engine.store().partial_path(&hash).exists());
    assert!(!h.engine.store().file_path(&hash).exists());
    assert_eq!(h.engine.ledger().attempts(&hash, FILE_URL), 1);
}

#[tokio::test]
async fn hash_mismatch_is_recorded_and_gates_the_next_attempt() {
    let hash = hash_of(b"what the registry promised");
    let http = FakeHttp::default();
    http.serve(FILE_URL, b"something else entirely".to_vec());
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL)), http);

    let err = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap_err();
    match &err {
        Error::HashMismatch { expected, actual } => {
            assert_eq!(expected, &hash);
            assert_eq!(actual, hash_of(b"something else entirely").as_str());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!h.engine.store().partial_path(&hash).exists());

    h.engine.ledger().flush().await;
    let persisted: serde_json::Value =
        serde_json::from_slice(&std::fs::read(h.root().join("fail_history.json")).unwrap()).unwrap();
    let key = format!("{hash}:{FILE_URL}");
    assert_eq!(persisted[&key]["attempts"][0]["timestamp"], START);

    let err = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap_err();
    match err {
        Error::RetryBackoff { retry_at, url, .. } => {
            assert_eq!(url, FILE_URL);
            assert_eq!(retry_at, START + 60_000);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.http.request_count(), 1);
}

#[tokio::test]
async fn backoff_reopens_strictly_after_the_delay() {
    let hash = hash_of(b"expected");
    let http = FakeHttp::default();
    http.serve(FILE_URL, b"unexpected".to_vec());
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL)), http);

    assert!(matches!(
        h.engine.fetch(&hash, ExpectedKind::File).await,
        Err(Error::HashMismatch { .. })
    ));

    h.clock.advance(Duration::from_millis(60_000));
    assert!(matches!(
        h.engine.fetch(&hash, ExpectedKind::File).await,
        Err(Error::RetryBackoff { .. })
    ));
    assert_eq!(h.http.request_count(), 1);

    h.clock.advance(Duration::from_millis(1));
    assert!(matches!(
        h.engine.fetch(&hash, ExpectedKind::File).await,
        Err(Error::HashMismatch { .. })
    ));
    assert_eq!(h.http.request_count(), 2);
    assert_eq!(h.engine.ledger().attempts(&hash, FILE_URL), 2);

    // Two failures double the delay.
    let last = START + 60_001;
    assert_eq!(h.engine.ledger().next_attempt_at(&hash, FILE_URL), Some(last + 120_000));
}

#[tokio::test]
async fn failed_pipeline_is_evicted_and_retried() {
    let body = b"eventually right".to_vec();
    let hash = hash_of(&body);
    let http = FakeHttp::default();
    http.serve(FILE_URL, b"first try is wrong".to_vec());
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL)), http);

    assert!(h.engine.fetch(&hash, ExpectedKind::File).await.is_err());

    h.http.serve(FILE_URL, body.clone());
    h.clock.advance(Duration::from_secs(61));
    let path = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap();

    assert_eq!(std::fs::read(path).unwrap(), body);
    assert_eq!(h.http.request_count(), 2);
}

#[tokio::test]
async fn archive_with_single_root_is_collapsed() {
    let archive = zip_bytes(&[
        ("my-dapp-1.0/", None),
        ("my-dapp-1.0/index.html", Some(b"<html/>")),
        ("my-dapp-1.0/js/main.js", Some(b"main()")),
    ]);
    let hash = hash_of(&archive);
    let http = FakeHttp::default();
    http.serve(APP_URL, archive);
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_archive(APP_URL)), http);

    let path = h.engine.fetch(&hash, ExpectedKind::Dapp).await.unwrap();
    assert!(path.is_dir());
    assert_eq!(dir_names(&path), vec!["index.html", "js"]);
    assert_eq!(std::fs::read(path.join("js/main.js")).unwrap(), b"main()");
    assert!(dir_names(&h.engine.store().partial_dir()).is_empty());
    assert!(dir_names(&h.engine.store().partial_extract_dir()).is_empty());
}

#[tokio::test]
async fn archive_with_several_entries_is_kept_as_is() {
    let archive = zip_bytes(&[("index.html", Some(b"<html/>")), ("assets/app.css", Some(b"body{}"))]);
    let hash = hash_of(&archive);
    let http = FakeHttp::default();
    http.serve(APP_URL, archive);
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_archive(APP_URL)), http);

    let path = h.engine.fetch(&hash, ExpectedKind::Dapp).await.unwrap();
    assert_eq!(dir_names(&path), vec!["assets", "index.html"]);
}

#[tokio::test]
async fn github_commit_resolves_to_codeload_archive() {
    let archive = zip_bytes(&[("repo-abc/index.html", Some(b"hi"))]);
    let hash = hash_of(&archive);
    let mut commit = [0u8; 32];
    commit[0] = 0xab;
    commit[31] = 0xcd;
    let url = format!("https://codeload.github.com/owner/repo/zip/ab{}cd", "00".repeat(30));

    let http = FakeHttp::default();
    http.serve(&url, archive);
    let entry = RegistryEntry {
        slug: "owner/repo".into(),
        commit,
        author: [1; 20],
    };
    let h = harness(StaticRegistry::new().with(hash.clone(), entry), http);

    let path = h.engine.fetch(&hash, ExpectedKind::Dapp).await.unwrap();
    assert_eq!(dir_names(&path), vec!["index.html"]);
    assert_eq!(h.http.requests(), vec![url]);
}

#[tokio::test]
async fn corrupt_archive_is_recorded_and_cleaned_up() {
    let bytes = b"PK\x03\x04 definitely not a zip".to_vec();
    let hash = hash_of(&bytes);
    let http = FakeHttp::default();
    http.serve(APP_URL, bytes);
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_archive(APP_URL)), http);

    let err = h.engine.fetch(&hash, ExpectedKind::Dapp).await.unwrap_err();
    assert!(matches!(err, Error::Extraction { .. }), "{err}");
    assert!(!h.engine.store().file_path(&hash).exists());
    assert!(dir_names(&h.engine.store().partial_dir()).is_empty());
    assert!(dir_names(&h.engine.store().partial_extract_dir()).is_empty());
    assert_eq!(h.engine.ledger().attempts(&hash, APP_URL), 1);
}

#[tokio::test]
async fn empty_slug_fails_before_any_network_call() {
    let hash = hash_of(b"anything");
    let entry = RegistryEntry {
        slug:   String::new(),
        commit: hashfetch::ARCHIVE_MARKER,
        author: [3; 20],
    };
    let h = harness(StaticRegistry::new().with(hash.clone(), entry), FakeHttp::default());

    let err = h.engine.fetch(&hash, ExpectedKind::Dapp).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution {
            reason: ResolutionError::EmptySlug,
            ..
        }
    ));
    assert_eq!(h.http.request_count(), 0);
    assert!(h.engine.ledger().entries().is_empty());
}

#[tokio::test]
async fn unknown_hash_is_not_found() {
    let hash = hash_of(b"nobody registered this");
    let h = harness(StaticRegistry::new(), FakeHttp::default());

    let err = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution {
            reason: ResolutionError::NotFound,
            ..
        }
    ));
    assert_eq!(h.registry.calls(), 1);
}

#[tokio::test]
async fn non_http_slug_is_rejected() {
    let hash = hash_of(b"x");
    let h = harness(
        StaticRegistry::new().with(hash.clone(), direct_file("file:///etc/passwd")),
        FakeHttp::default(),
    );

    let err = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution {
            reason: ResolutionError::NotHttp(_),
            ..
        }
    ));
    assert_eq!(h.http.request_count(), 0);
}

#[tokio::test]
async fn kind_mismatch_leaves_artifact_cached() {
    let archive = zip_bytes(&[("index.html", Some(b"<html/>")), ("app.js", Some(b"1"))]);
    let hash = hash_of(&archive);
    let http = FakeHttp::default();
    http.serve(APP_URL, archive);
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_archive(APP_URL)), http);

    let err = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap_err();
    assert!(matches!(
        err,
        Error::KindMismatch {
            expected: ExpectedKind::File,
            found: ArtifactKind::Directory,
            ..
        }
    ));
    assert!(h.engine.store().file_path(&hash).is_dir());
    assert!(h.engine.ledger().entries().is_empty());

    let path = h.engine.fetch(&hash, ExpectedKind::Dapp).await.unwrap();
    assert!(path.is_dir());
    assert_eq!(h.http.request_count(), 1);
}

#[tokio::test]
async fn file_fetched_as_dapp_is_a_mismatch() {
    let body = b"plain".to_vec();
    let hash = hash_of(&body);
    let http = FakeHttp::default();
    http.serve(FILE_URL, body);
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL)), http);

    let err = h.engine.fetch(&hash, ExpectedKind::Dapp).await.unwrap_err();
    assert!(matches!(
        err,
        Error::KindMismatch {
            found: ArtifactKind::File,
            ..
        }
    ));
    assert!(h.engine.store().file_path(&hash).is_file());
}

#[tokio::test]
async fn hex_hashes_are_validated() {
    let h = harness(StaticRegistry::new(), FakeHttp::default());

    let err = h.engine.fetch_hex("0x1234", ExpectedKind::File).await.unwrap_err();
    assert!(matches!(err, Error::InvalidHash(ref s) if s == "0x1234"));
}

#[tokio::test]
async fn restart_keeps_backoff_and_cleans_scratch() {
    let hash = hash_of(b"expected");
    let registry = StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL));
    let http = FakeHttp::default();
    http.serve(FILE_URL, b"wrong".to_vec());
    let h = harness(registry.clone(), http);

    assert!(h.engine.fetch(&hash, ExpectedKind::File).await.is_err());
    h.engine.ledger().flush().await;
    write_file(&h.engine.store().partial_path(&hash), b"stale");

    let clock = hashfetch::ManualClock::new(START + 1_000);
    let restarted = hashfetch::HashFetch::with_clock(
        options(&h.dir),
        Arc::new(CountingRegistry::new(registry)),
        hashfetch::LocalTransport::new(Arc::clone(&h.http)),
        Arc::new(clock),
    );

    let err = restarted.fetch(&hash, ExpectedKind::File).await.unwrap_err();
    assert!(matches!(err, Error::RetryBackoff { .. }), "{err}");
    assert!(dir_names(&restarted.store().partial_dir()).is_empty());
    assert_eq!(h.http.request_count(), 1);
}

#[tokio::test]
async fn removed_artifact_is_fetched_again() {
    let body = b"evicted behind our back".to_vec();
    let hash = hash_of(&body);
    let http = FakeHttp::default();
    http.serve(FILE_URL, body.clone());
    let h = harness(StaticRegistry::new().with(hash.clone(), direct_file(FILE_URL)), http);

    let path = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap();
    std::fs::remove_file(&path).unwrap();

    let again = h.engine.fetch(&hash, ExpectedKind::File).await.unwrap();
    assert_eq!(again, path);
    assert_eq!(std::fs::read(&again).unwrap(), body);
    assert_eq!(h.http.request_count(), 2);

    // The fresh pipeline is reused as usual.
    h.engine.fetch(&hash, ExpectedKind::File).await.unwrap();
    assert_eq!(h.http.request_count(), 2);
}
