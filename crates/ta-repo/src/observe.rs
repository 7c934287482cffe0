use std::sync::Arc;

use futures_util::Stream;
use ta_db::Database;
use ta_types::Table;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::debug;

use crate::error::Result;

/// Runs a blocking store call off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

/// A live query: yields the result of `query` right away, then again every
/// time one of `tables` is written to. Invalidations that pile up while the
/// consumer is busy collapse into a single re-run.
pub fn observe<T, F>(
    db: Arc<Database>,
    tables: &'static [Table],
    query: F,
) -> impl Stream<Item = Result<T>> + Send + 'static
where
    T: Send + 'static,
    F: Fn(&Database) -> anyhow::Result<T> + Send + Sync + 'static,
{
    let query = Arc::new(query);

    async_stream::stream! {
        // Subscribe before the first read so no write slips in between
        let mut rx = db.subscribe();

        loop {
            let (db_ref, q) = (db.clone(), query.clone());
            yield blocking(move || (*q)(&*db_ref)).await;

            loop {
                match rx.recv().await {
                    Ok(event) if event.affects(tables) => break,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Observer lagged by {} events, re-querying", skipped);
                        break;
                    }
                    Err(RecvError::Closed) => return,
                }
            }

            loop {
                match rx.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Closed) => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_emits_initial_and_after_write() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let stream = observe(db.clone(), &[Table::Groups], |db| db.all_groups());
        tokio::pin!(stream);

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.is_empty());

        db.insert_group("inbox").unwrap();

        let second = timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "inbox");
    }

    #[tokio::test]
    async fn test_lagged_observer_requeries_once() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let stream = observe(db.clone(), &[Table::Groups], |db| db.all_groups());
        tokio::pin!(stream);
        stream.next().await.unwrap().unwrap();

        // More writes than the event channel holds
        for i in 0..300 {
            db.insert_group(&format!("g{}", i)).unwrap();
        }

        let fresh = timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(fresh.len(), 300);

        let next = timeout(Duration::from_millis(200), stream.next()).await;
        assert!(next.is_err(), "missed events collapse into one re-run");
    }

    #[tokio::test]
    async fn test_ignores_unrelated_tables() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let stream = observe(db.clone(), &[Table::Groups], |db| db.all_groups());
        tokio::pin!(stream);
        stream.next().await.unwrap().unwrap();

        db.insert_user("Work", "#FF4CAF50", false).unwrap();

        let next = timeout(Duration::from_millis(200), stream.next()).await;
        assert!(next.is_err(), "users write must not re-run a groups query");
    }
}
