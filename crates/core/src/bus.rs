//! 이벤트 버스 -- 프로세스 내 토픽 기반 publish/subscribe 라우터
//!
//! # 전달 규칙
//!
//! - `publish`는 호출 스택에서 동기적으로 모든 핸들러를 실행한 뒤 반환합니다.
//! - 순서: 해당 토픽 구독자(등록 순) → 와일드카드 구독자(등록 순)
//! - 핸들러 단위 격리: 에러 반환과 panic 모두 잡아서 로깅하며,
//!   다음 핸들러 전달과 발행자에게 영향을 주지 않습니다.
//!
//! 디스패치 전에 구독 목록을 복사하므로 락을 잡은 채 핸들러를 실행하지 않습니다.
//! 따라서 핸들러 내부에서 다시 `publish`하거나 `subscribe`해도 교착 상태가 없습니다.
//! 핸들러 실행 중 추가된 구독은 다음 `publish`부터 적용됩니다.

use std::collections::HashMap;
use std::error::Error;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, error};

use crate::event::{BusMessage, Topic};
use crate::metrics as m;

/// 핸들러 실행 결과
pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// 구독 핸들러
pub type Handler = Arc<dyn Fn(&BusMessage) -> HandlerResult + Send + Sync>;

/// 구독 식별자 (`unsubscribe`에 사용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    name: Arc<str>,
    handler: Handler,
}

/// 한 번의 `publish` 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// 정상 완료된 핸들러 수
    pub delivered: usize,
    /// 에러 반환 또는 panic 한 핸들러 수
    pub failed: usize,
}

impl DeliveryReport {
    /// 실행된 전체 핸들러 수
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

/// 토픽 기반 이벤트 버스
///
/// 파이프라인 인스턴스마다 하나씩 생성되며 `Arc`로 공유됩니다.
pub struct EventBus {
    topics: RwLock<HashMap<Topic, Vec<Subscription>>>,
    wildcard: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    published: AtomicU64,
    handler_failures: AtomicU64,
}

impl EventBus {
    /// 빈 버스를 생성합니다.
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            wildcard: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }

    fn make_subscription<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&BusMessage) -> HandlerResult + Send + Sync + 'static,
    {
        Subscription {
            id: SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            name: Arc::from(name),
            handler: Arc::new(handler),
        }
    }

    /// 특정 토픽을 구독합니다.
    ///
    /// `name`은 로그와 메트릭에서 구독자를 식별하는 데 사용됩니다.
    pub fn subscribe<F>(&self, topic: Topic, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&BusMessage) -> HandlerResult + Send + Sync + 'static,
    {
        let sub = self.make_subscription(name, handler);
        let id = sub.id;
        self.topics.write().entry(topic).or_default().push(sub);
        debug!(topic = %topic, subscriber = name, "subscribed");
        id
    }

    /// 모든 토픽을 구독합니다.
    pub fn subscribe_all<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&BusMessage) -> HandlerResult + Send + Sync + 'static,
    {
        let sub = self.make_subscription(name, handler);
        let id = sub.id;
        self.wildcard.write().push(sub);
        debug!(subscriber = name, "subscribed to all topics");
        id
    }

    /// 구독을 해제합니다. 해제되었으면 `true`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        {
            let mut topics = self.topics.write();
            for subs in topics.values_mut() {
                if let Some(pos) = subs.iter().position(|s| s.id == id) {
                    subs.remove(pos);
                    return true;
                }
            }
        }
        let mut wildcard = self.wildcard.write();
        if let Some(pos) = wildcard.iter().position(|s| s.id == id) {
            wildcard.remove(pos);
            return true;
        }
        false
    }

    /// 메시지를 발행합니다.
    ///
    /// 모든 핸들러 실행이 끝난 뒤 반환합니다. 핸들러 실패는 발행자에게 전파되지 않고
    /// [`DeliveryReport::failed`]에만 반영됩니다.
    pub fn publish(&self, message: impl Into<BusMessage>) -> DeliveryReport {
        let message = message.into();
        let topic = message.topic();

        let snapshot: Vec<Subscription> = {
            let topics = self.topics.read();
            let wildcard = self.wildcard.read();
            topics
                .get(&topic)
                .into_iter()
                .flatten()
                .chain(wildcard.iter())
                .cloned()
                .collect()
        };

        self.published.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::BUS_MESSAGES_PUBLISHED_TOTAL, m::LABEL_TOPIC => topic.as_str())
            .increment(1);

        let mut report = DeliveryReport::default();
        for sub in &snapshot {
            if self.dispatch(topic, sub, &message) {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }

    /// 핸들러 하나를 격리 실행합니다. 성공하면 `true`.
    fn dispatch(&self, topic: Topic, sub: &Subscription, message: &BusMessage) -> bool {
        let outcome = catch_unwind(AssertUnwindSafe(|| (sub.handler)(message)));
        let failure = match outcome {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        self.handler_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            m::BUS_HANDLER_FAILURES_TOTAL,
            m::LABEL_TOPIC => topic.as_str(),
            m::LABEL_SUBSCRIBER => sub.name.to_string()
        )
        .increment(1);
        error!(
            topic = %topic,
            subscriber = %sub.name,
            error = %failure,
            "subscriber failed while handling message"
        );
        false
    }

    /// 지금까지 발행된 메시지 수
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// 지금까지 실패한 핸들러 호출 수
    pub fn failure_count(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }

    /// 토픽별 구독자 수 (와일드카드 제외)
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics.read().get(&topic).map_or(0, Vec::len)
    }

    /// 와일드카드 구독자 수
    pub fn wildcard_count(&self) -> usize {
        self.wildcard.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.topics.read().len())
            .field("wildcard", &self.wildcard_count())
            .field("published", &self.published_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: <non-string payload>".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawLog;
    use parking_lot::Mutex;

    fn raw(line: &str) -> RawLog {
        RawLog::new(line, "test")
    }

    #[test]
    fn topic_handlers_run_before_wildcard_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        bus.subscribe_all("wild", move |_| {
            o.lock().push("wild");
            Ok(())
        });
        let o = Arc::clone(&order);
        bus.subscribe(Topic::RawLog, "first", move |_| {
            o.lock().push("first");
            Ok(())
        });
        let o = Arc::clone(&order);
        bus.subscribe(Topic::RawLog, "second", move |_| {
            o.lock().push("second");
            Ok(())
        });

        let report = bus.publish(raw("x"));
        assert_eq!(report.delivered, 3);
        assert_eq!(*order.lock(), vec!["first", "second", "wild"]);
    }

    #[test]
    fn other_topics_are_not_delivered() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        bus.subscribe(Topic::Incident, "incidents", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = bus.publish(raw("x"));
        assert_eq!(report.total(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_handler_does_not_stop_fan_out() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));

        bus.subscribe(Topic::RawLog, "broken", |_| Err("boom".into()));
        bus.subscribe(Topic::RawLog, "panicky", |_| panic!("handler exploded"));
        let h = Arc::clone(&hits);
        bus.subscribe(Topic::RawLog, "healthy", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let h = Arc::clone(&hits);
        bus.subscribe_all("audit", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = bus.publish(raw("x"));
        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(bus.failure_count(), 2);
    }

    #[test]
    fn nested_publish_from_handler() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&bus);
        bus.subscribe(Topic::RawLog, "relay", move |msg| {
            if let (BusMessage::RawLog(r), Some(bus)) = (msg, weak.upgrade())
                && r.line == "outer"
            {
                bus.publish(raw("inner"));
            }
            Ok(())
        });
        let s = Arc::clone(&seen);
        bus.subscribe_all("recorder", move |msg| {
            if let BusMessage::RawLog(r) = msg {
                s.lock().push(r.line.clone());
            }
            Ok(())
        });

        bus.publish(raw("outer"));
        // 내부 publish가 먼저 완료된 뒤 외부 와일드카드 핸들러가 실행됨
        assert_eq!(*seen.lock(), vec!["inner".to_owned(), "outer".to_owned()]);
        assert_eq!(bus.published_count(), 2);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let id = bus.subscribe(Topic::RawLog, "tmp", |_| Ok(()));
        let wid = bus.subscribe_all("tmp-all", |_| Ok(()));
        assert_eq!(bus.subscriber_count(Topic::RawLog), 1);

        assert!(bus.unsubscribe(id));
        assert!(bus.unsubscribe(wid));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(Topic::RawLog), 0);
        assert_eq!(bus.wildcard_count(), 0);
    }

    #[test]
    fn panic_message_extracts_payload() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("bad");
        assert_eq!(panic_message(payload.as_ref()), "panic: bad");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u32);
        assert!(panic_message(payload.as_ref()).contains("non-string"));
    }
}
