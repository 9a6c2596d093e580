//! Encrypted object store against an in-memory backend

use assert_matches::assert_matches;
use futures::StreamExt;
use meme_core::{MemeError, ObjectId, ObjectNonce};
use meme_store::cipher::{HEADER_LEN, TAG_LEN};
use meme_store::EncryptedObjectStore;
use meme_testkit::memory_store;
use proptest::prelude::*;

#[tokio::test]
async fn test_hello_round_trip_and_wrong_nonce() {
    let fx = memory_store(1);
    let id = ObjectId::new("hello");
    let nonce = fx.store.gen_nonce().await;

    fx.store.put_bytes(&id, b"hello", "text/plain", &nonce).await.unwrap();
    assert_eq!(fx.store.get_bytes(&id, &nonce).await.unwrap(), b"hello");

    let other = fx.store.gen_nonce().await;
    assert_ne!(other, nonce);
    assert_matches!(fx.store.get(&id, &other).await, Err(MemeError::Integrity));
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let fx = memory_store(2);
    let nonce = ObjectNonce::from_bytes([1; 32]);
    let err = fx.store.get(&ObjectId::new("nope"), &nonce).await.unwrap_err();
    assert_matches!(err, MemeError::NotFound { .. });
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_tampered_ciphertext_fails_integrity() {
    let fx = memory_store(3);
    let id = ObjectId::new("tampered");
    let nonce = fx.store.gen_nonce().await;
    fx.store.put_bytes(&id, b"some bytes worth protecting", "text/plain", &nonce).await.unwrap();

    fx.backend.tamper(id.as_str(), |blob| blob[HEADER_LEN + 3] ^= 0x80).await.unwrap();
    let err = fx.store.get_bytes(&id, &nonce).await.unwrap_err();
    assert_matches!(err, MemeError::Integrity);
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_tampered_tail_fails_mid_stream() {
    let fx = memory_store(4);
    let store = fx.store.clone().with_chunk_size(16).unwrap();
    let id = ObjectId::new("tail");
    let nonce = store.gen_nonce().await;
    store.put_bytes(&id, &[0xab; 40], "application/octet-stream", &nonce).await.unwrap();

    fx.backend.tamper(id.as_str(), |blob| {
        let last = blob.len() - 1;
        blob[last] ^= 1;
    }).await.unwrap();

    let mut stream = store.get(&id, &nonce).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), vec![0xab; 16]);
    assert_eq!(stream.next().await.unwrap().unwrap(), vec![0xab; 16]);
    assert_matches!(stream.next().await, Some(Err(MemeError::Integrity)));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_truncated_ciphertext_fails_integrity() {
    let fx = memory_store(5);
    let store = fx.store.clone().with_chunk_size(16).unwrap();
    let id = ObjectId::new("truncated");
    let nonce = store.gen_nonce().await;
    store.put_bytes(&id, &[7; 48], "application/octet-stream", &nonce).await.unwrap();

    fx.backend.tamper(id.as_str(), |blob| blob.truncate(HEADER_LEN + 2 * (16 + TAG_LEN))).await.unwrap();
    assert_matches!(store.get_bytes(&id, &nonce).await, Err(MemeError::Integrity));
}

#[tokio::test]
async fn test_ingest_is_content_addressed() {
    let fx = memory_store(6);
    let content = b"cat picture".to_vec();

    let first = fx.store.ingest(content.clone(), "image/png").await.unwrap();
    assert_eq!(first.id, EncryptedObjectStore::content_id(&content));
    let stored = first.write.await.unwrap().unwrap();
    assert_eq!(stored.content_type, "image/png");

    // Same bytes again: nothing is rewritten and the first nonce keeps working
    assert_matches!(
        fx.store.ingest(content.clone(), "image/png").await,
        Err(MemeError::Conflict { .. })
    );
    assert_eq!(fx.store.get_bytes(&first.id, &first.nonce).await.unwrap(), content);
    assert_eq!(fx.store.list("").await.unwrap(), vec![first.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_racing_ingests_keep_one_object() {
    let fx = memory_store(8);
    let content = vec![0x42; 200_000];

    let (a, b) = tokio::join!(
        fx.store.ingest(content.clone(), "image/jpeg"),
        fx.store.ingest(content.clone(), "image/jpeg")
    );
    let mut readable = 0;
    for ingested in [a, b].into_iter().flatten() {
        match ingested.write.await.unwrap() {
            Ok(_) => {
                let plaintext = fx.store.get_bytes(&ingested.id, &ingested.nonce).await.unwrap();
                assert_eq!(plaintext, content);
                readable += 1;
            }
            Err(err) => assert_matches!(err, MemeError::Conflict { .. }),
        }
    }
    assert_eq!(readable, 1);
}

#[tokio::test]
async fn test_oversized_declared_length_is_rejected() {
    let fx = memory_store(9);
    let id = ObjectId::new("huge");
    let nonce = fx.store.gen_nonce().await;

    assert_matches!(
        fx.store.put(&id, &b"hi"[..], u64::MAX - 8, "text/plain", &nonce).await,
        Err(MemeError::Invalid { .. })
    );
    // Plausible but false: fails on the short body without reserving it up front
    assert_matches!(
        fx.store.put(&id, &b"hi"[..], 1 << 40, "text/plain", &nonce).await,
        Err(MemeError::Invalid { .. })
    );
    assert_matches!(fx.store.get_bytes(&id, &nonce).await, Err(MemeError::NotFound { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_writes() {
    let fx = memory_store(7);
    let mut handles = Vec::new();
    for i in 0..16u8 {
        let id = ObjectId::new(format!("obj-{i:02}"));
        let nonce = fx.store.gen_nonce().await;
        handles.push((id.clone(), nonce, fx.store.spawn_put(id, vec![i; 1000], "x".into(), nonce)));
    }
    for (id, nonce, handle) in handles {
        handle.await.unwrap().unwrap();
        let plaintext = fx.store.get_bytes(&id, &nonce).await.unwrap();
        assert!(plaintext.iter().all(|b| *b == plaintext[0]));
    }
    assert_eq!(fx.store.list("obj-").await.unwrap().len(), 16);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stored_objects_round_trip(
        content in prop::collection::vec(any::<u8>(), 0..300),
        chunk_size in 1u32..64,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let fx = memory_store(8);
        let store = fx.store.with_chunk_size(chunk_size).unwrap();
        let id = ObjectId::new("prop");
        let nonce = ObjectNonce::from_bytes([3; 32]);

        let roundtrip = runtime.block_on(async {
            store.put_bytes(&id, &content, "x", &nonce).await.unwrap();
            store.get_bytes(&id, &nonce).await.unwrap()
        });
        prop_assert_eq!(roundtrip, content);
    }
}
