use futures_util::StreamExt;
use rs2_paging::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn failing_after(values: Vec<i32>, err: StreamError) -> ElementStream<i32> {
    create_stream(1, move |sink| async move {
        sink.send_batch(values, &CancelToken::never()).await;
        Err(err)
    })
}

#[tokio::test]
async fn test_map_transforms_values() {
    let result = ElementStream::from_vec(vec![1, 2, 3])
        .map(|x| x * 10)
        .collect_to_vec()
        .await;
    assert_eq!(result, Ok(vec![10, 20, 30]));
}

#[tokio::test]
async fn test_map_passes_failure_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);

    let elements: Vec<Element<String>> = failing_after(vec![1, 2], StreamError::Cancelled)
        .map(move |x| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            x.to_string()
        })
        .collect()
        .await;

    assert_eq!(
        elements,
        vec![
            Element::Data("1".to_string()),
            Element::Data("2".to_string()),
            Element::Failure(StreamError::Cancelled),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_map_is_lazy() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);

    let mut stream = ElementStream::from_vec((0..100).collect()).map(move |x: i32| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        x
    });

    assert_eq!(stream.next().await, Some(Element::Data(0)));
    sleep(Duration::from_millis(20)).await;

    // one value handed over, one queued, one waiting in the mapper's hand
    assert!(calls.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_try_map_error_ends_stream() {
    let (values, err) = ElementStream::from_vec(vec![1, 2, 3, 4])
        .try_map(|x| {
            if x == 3 {
                Err(StreamError::consumer("three"))
            } else {
                Ok(x)
            }
        })
        .collect_partial()
        .await;

    assert_eq!(values, vec![1, 2]);
    assert_eq!(err, Some(StreamError::consumer("three")));
}

#[tokio::test]
async fn test_filter() {
    let result = ElementStream::from_vec((1..=10).collect())
        .filter(|x| x % 2 == 0)
        .collect_to_vec()
        .await
        .unwrap();
    assert_eq!(result, vec![2, 4, 6, 8, 10]);
}

#[tokio::test]
async fn test_flat_map_is_sequential() {
    let result = ElementStream::from_vec(vec!['A', 'B'])
        .flat_map(|outer| {
            create_stream(1, move |sink| async move {
                let token = CancelToken::never();
                let (first, second) = if outer == 'A' { (1, 2) } else { (3, 4) };
                sink.send(first, &token).await;
                if outer == 'A' {
                    // B's inner stream must still wait for this one
                    sleep(Duration::from_millis(50)).await;
                }
                sink.send(second, &token).await;
                Ok(())
            })
        })
        .collect_to_vec()
        .await;

    assert_eq!(result, Ok(vec![1, 2, 3, 4]));
}

#[tokio::test]
async fn test_flat_map_inner_failure_short_circuits() {
    let outer_seen = Arc::new(AtomicUsize::new(0));
    let outer_seen_clone = Arc::clone(&outer_seen);

    let (values, err) = ElementStream::from_vec(vec![1, 2, 3])
        .flat_map(move |x| {
            outer_seen_clone.fetch_add(1, Ordering::SeqCst);
            if x == 2 {
                failing_after(vec![20], StreamError::consumer("inner"))
            } else {
                ElementStream::from_vec(vec![x * 10, x * 10 + 1])
            }
        })
        .collect_partial()
        .await;

    assert_eq!(values, vec![10, 11, 20]);
    assert_eq!(err, Some(StreamError::consumer("inner")));
    assert_eq!(outer_seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_flat_map_outer_failure() {
    let result = failing_after(vec![1], StreamError::Cancelled)
        .flat_map(|x| ElementStream::from_vec(vec![x, x]))
        .collect_partial()
        .await;

    assert_eq!(result, (vec![1, 1], Some(StreamError::Cancelled)));
}

#[tokio::test]
async fn test_for_each_stops_on_action_error() {
    let mut seen = Vec::new();
    let outcome = ElementStream::from_vec(vec![1, 2, 3, 4])
        .for_each(|x| {
            if x == 3 {
                return Err(StreamError::consumer("stop"));
            }
            seen.push(x);
            Ok(())
        })
        .await;

    assert_eq!(outcome, Err(StreamError::consumer("stop")));
    assert_eq!(seen, vec![1, 2]);
}

#[tokio::test]
async fn test_for_each_stops_on_failure_element() {
    let mut seen = Vec::new();
    let outcome = for_each(failing_after(vec![5, 6], StreamError::Cancelled), |x| {
        seen.push(x);
        Ok(())
    })
    .await;

    assert_eq!(outcome, Err(StreamError::Cancelled));
    assert_eq!(seen, vec![5, 6]);
}

#[tokio::test]
async fn test_collect_to_vec_discards_prefix_on_error() {
    let result = collect_to_vec(failing_after(vec![1, 2], StreamError::consumer("x"))).await;
    assert_eq!(result, Err(StreamError::consumer("x")));

    let (prefix, err) = collect_partial(failing_after(vec![1, 2], StreamError::consumer("x"))).await;
    assert_eq!(prefix, vec![1, 2]);
    assert!(err.is_some());
}

#[tokio::test]
async fn test_into_results() {
    let results: Vec<StreamResult<i32>> = failing_after(vec![1], StreamError::Cancelled)
        .into_results()
        .collect()
        .await;
    assert_eq!(results, vec![Ok(1), Err(StreamError::Cancelled)]);
}

#[tokio::test]
async fn test_free_functions_compose() {
    let stream = ElementStream::from_vec(vec![1, 2, 3]);
    let doubled = map(stream, |x| x * 2);
    let kept = filter(doubled, |x| *x > 2);
    let expanded = flat_map(kept, |x| ElementStream::from_vec(vec![x; 2]));
    let parsed = try_map(expanded, |x| Ok(x + 1));

    assert_eq!(collect_to_vec(parsed).await, Ok(vec![5, 5, 7, 7]));
}

#[tokio::test]
async fn test_dropping_derived_stream_stops_upstream_producer() {
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();

    let source = create_stream(1, move |sink| async move {
        let token = CancelToken::never();
        let mut i = 0u64;
        while sink.send(i, &token).await {
            i += 1;
        }
        let _ = done_tx.send(i);
        Err(StreamError::Disconnected)
    });

    let mut mapped = source.map(|x| x + 1);
    assert_eq!(mapped.next().await, Some(Element::Data(1)));
    drop(mapped);

    let produced = timeout(Duration::from_secs(1), done_rx)
        .await
        .expect("upstream producer kept running")
        .unwrap();
    assert!(produced < 10);
}
