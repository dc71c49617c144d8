//! 限流重试（with_retries）
//!
//! 仅对带有等待提示的限流错误进行重试，等待时长完全由服务端提示决定，
//! 不叠加客户端指数退避或抖动；重试次数不设上限。
//!
use super::Outcome;
use crate::channels;
use crate::error::{BotError, BotResult};
use std::future::Future;

/// 执行 `operation`，遇到带等待提示的限流错误时按提示休眠后重试
///
/// 交付方式以首次调用为准：首次以 `Err` 返回（抛出）的，最终的无提示限流错误也以
/// `Err` 返回；首次以 `Ok(Outcome::Rejected)` 返回（抑制）的，最终结果同样以值返回。
/// 非限流错误一律以 `Err` 返回。
pub async fn with_retries<T, F, Fut>(mut operation: F) -> BotResult<Outcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BotResult<Outcome<T>>>,
{
    let first = operation().await;
    let raised = first.is_err();
    let mut current = settle(first);

    loop {
        match current {
            Ok(value) => return Ok(Outcome::Value(value)),
            Err(BotError::Api(err)) if err.is_rate_limited() => match err.retry_after() {
                Some(wait) => {
                    tracing::warn!(
                        target: channels::API,
                        method = %err.method(),
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    current = settle(operation().await);
                }
                None if raised => return Err(BotError::Api(err)),
                None => return Ok(Outcome::Rejected(err)),
            },
            Err(err) => return Err(err),
        }
    }
}

// 抛出与抑制两种结果归一为同一形态
fn settle<T>(result: BotResult<Outcome<T>>) -> BotResult<T> {
    result.and_then(Outcome::into_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, TOO_MANY_REQUESTS};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn limited(wait: Option<Duration>) -> ApiError {
        ApiError::builder()
            .method("sendMessage")
            .code(TOO_MANY_REQUESTS)
            .description("Too Many Requests")
            .maybe_retry_after(wait)
            .build()
    }

    fn forbidden() -> ApiError {
        ApiError::builder()
            .method("sendMessage")
            .code(403)
            .description("Forbidden: bot was blocked by the user")
            .build()
    }

    #[tokio::test]
    async fn retries_until_success_and_waits_for_each_hint() {
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let outcome = with_retries(|| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(limited(Some(Duration::from_millis(10))).into())
                } else {
                    Ok(Outcome::Value(42))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn non_rate_limited_error_is_raised_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));

        let err = with_retries(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Outcome<()>, _>(forbidden().into())
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let err = err.as_api().unwrap();
        assert_eq!(err.code(), 403);
        assert_eq!(err.description(), "Forbidden: bot was blocked by the user");
    }

    #[tokio::test]
    async fn returned_non_rate_limited_error_is_still_raised() {
        let err = with_retries(|| async { Ok(Outcome::<()>::Rejected(forbidden())) })
            .await
            .unwrap_err();
        assert_eq!(err.as_api().map(ApiError::code), Some(403));
    }

    #[tokio::test]
    async fn hintless_rate_limit_keeps_returned_delivery() {
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = with_retries(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::<()>::Rejected(limited(None)))
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(outcome.rejected().is_some_and(ApiError::is_rate_limited));
    }

    #[tokio::test]
    async fn hintless_rate_limit_keeps_raised_delivery() {
        let err = with_retries(|| async { Err::<Outcome<()>, _>(limited(None).into()) })
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn delivery_mode_follows_first_attempt_after_retries() {
        let calls = Arc::new(AtomicUsize::new(0));

        // 首次以值返回，后续以 Err 返回：最终仍以值返回
        let outcome = with_retries(|| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(Outcome::<()>::Rejected(limited(Some(Duration::from_millis(1)))))
                } else {
                    Err(limited(None).into())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(outcome.is_rejected());
    }

    #[tokio::test]
    async fn retry_hint_is_honored_whatever_the_code() {
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = with_retries(|| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    let flood = ApiError::builder()
                        .method("sendMessage")
                        .code(400)
                        .description("Bad Request: flood control exceeded")
                        .retry_after(Duration::from_millis(5))
                        .build();
                    Err(flood.into())
                } else {
                    Ok(Outcome::Value("sent"))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.value(), Some("sent"));
    }

    #[tokio::test]
    async fn transport_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));

        let err = with_retries(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Outcome<()>, _>(BotError::transport("connection reset"))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, BotError::Transport { .. }));
    }
}
