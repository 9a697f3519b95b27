mod common;

use std::time::Duration;

use common::{endpoint, CountingDecoder, Script, ScriptedAcquirer};
use futures::StreamExt;
use tether_core::{spawn_consumer, CancellationToken, Consumer, DecodeOptions};

fn consumer(acquirer: &ScriptedAcquirer) -> Consumer<ScriptedAcquirer, CountingDecoder> {
    Consumer::new(
        acquirer.clone(),
        CountingDecoder::default(),
        DecodeOptions::default(),
    )
}

#[tokio::test]
async fn test_channel_delivers_in_order() {
    let acquirer = ScriptedAcquirer::new(vec![
        Script::reset(&[r#"["A","B","#]),
        Script::Refuse,
        Script::body(&[r#"["C", null, "D"]"#]),
    ]);
    let mut handle = spawn_consumer::<String, _, _>(
        &consumer(&acquirer),
        endpoint(),
        1,
        CancellationToken::new(),
    );

    let mut items = Vec::new();
    while let Some(item) = handle.recv().await {
        items.push(item.unwrap());
    }

    assert_eq!(items, vec!["A", "B", "C", "D"]);
    assert_eq!(acquirer.opens(), 3);
    handle.join().await.unwrap();
    assert_eq!(acquirer.stream_drops(), 2);
}

#[tokio::test]
async fn test_cancel_through_handle() {
    let acquirer = ScriptedAcquirer::new(vec![Script::hang(&[r#"["A","#])]);
    let mut handle = spawn_consumer::<String, _, _>(
        &consumer(&acquirer),
        endpoint(),
        4,
        CancellationToken::new(),
    );

    assert_eq!(handle.recv().await.unwrap().unwrap(), "A");
    handle.cancel();

    let end = tokio::time::timeout(Duration::from_secs(5), handle.recv())
        .await
        .expect("producer did not stop");
    assert!(end.is_none());
    handle.join().await.unwrap();
    assert_eq!(acquirer.stream_drops(), 1);
}

#[tokio::test]
async fn test_dropped_receiver_stops_producer() {
    let acquirer = ScriptedAcquirer::new(vec![Script::hang(&[r#"["A","B","C","#])]);
    let handle = spawn_consumer::<String, _, _>(
        &consumer(&acquirer),
        endpoint(),
        1,
        CancellationToken::new(),
    );

    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("producer did not notice the receiver going away")
        .unwrap();
    assert_eq!(acquirer.stream_drops(), 1);
}

#[tokio::test]
async fn test_into_stream() {
    let acquirer = ScriptedAcquirer::new(vec![Script::body(&[r#"["A","B"]"#])]);
    let handle = spawn_consumer::<String, _, _>(
        &consumer(&acquirer),
        endpoint(),
        8,
        CancellationToken::new(),
    );

    let items: Vec<String> = handle.into_stream().map(Result::unwrap).collect().await;
    assert_eq!(items, vec!["A", "B"]);
}
