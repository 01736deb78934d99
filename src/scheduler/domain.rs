//! Work domains and chained parallel stages
//!
//! A [`TaskDomain`] hands out units of work to however many workers enter a
//! [`DomainTaskChain`] concurrently. Contiguous domains claim with an atomic
//! counter, lazy ones behind a lock. Chains hold their shared context weakly,
//! so dropping the context cancels every remaining stage.
//!
//! Author: Moroya Sakamoto

use super::{ParallelTask, Scheduler};
use crate::octree::SdfOctree;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// A claimable supply of work items
///
/// `claim` is entered concurrently; it must hand every item out exactly once
/// and answer `None` forever after the supply runs dry.
pub trait TaskDomain: Send + Sync {
    /// One unit of work
    type Item: Send;
    /// Called once, before the first claim, behind the chain's setup lock
    fn prime(&self);
    /// Take the next item, or `None` when exhausted
    fn claim(&self) -> Option<Self::Item>;
}

/// Indices `0..len`, claimed by atomic increment
///
/// The length lives behind a shared atomic so an earlier pipeline stage can
/// grow it before this one primes.
pub struct IndexRange {
    next: AtomicUsize,
    len: Arc<AtomicUsize>,
}

impl IndexRange {
    /// Domain over a fixed range
    pub fn new(len: usize) -> IndexRange {
        IndexRange {
            next: AtomicUsize::new(0),
            len: Arc::new(AtomicUsize::new(len)),
        }
    }

    /// Domain whose length is published elsewhere
    pub fn shared(len: Arc<AtomicUsize>) -> IndexRange {
        IndexRange {
            next: AtomicUsize::new(0),
            len,
        }
    }
}

impl TaskDomain for IndexRange {
    type Item = usize;

    fn prime(&self) {
        self.next.store(0, Ordering::SeqCst);
    }

    fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        if index < self.len.load(Ordering::SeqCst) {
            Some(index)
        } else {
            None
        }
    }
}

/// Any iterator, drained one item per claim behind a lock
pub struct IterDomain<I: Iterator> {
    iter: Mutex<I>,
}

impl<I: Iterator> IterDomain<I> {
    /// Wrap an iterator as a domain
    pub fn new(iter: I) -> IterDomain<I> {
        IterDomain {
            iter: Mutex::new(iter),
        }
    }
}

impl<I> TaskDomain for IterDomain<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    type Item = I::Item;

    fn prime(&self) {}

    fn claim(&self) -> Option<I::Item> {
        self.iter.lock().next()
    }
}

/// The linked leaf cells of an octree, claimed in thread order
pub struct LeafChain {
    octree: Arc<SdfOctree>,
    cursor: Mutex<Option<u32>>,
}

impl LeafChain {
    /// Domain over every evaluator-holding leaf of `octree`
    pub fn new(octree: Arc<SdfOctree>) -> LeafChain {
        let first = octree.first_leaf();
        LeafChain {
            octree,
            cursor: Mutex::new(first),
        }
    }
}

impl TaskDomain for LeafChain {
    type Item = u32;

    fn prime(&self) {
        *self.cursor.lock() = self.octree.first_leaf();
    }

    fn claim(&self) -> Option<u32> {
        let mut cursor = self.cursor.lock();
        let index = (*cursor)?;
        *cursor = self.octree.cells()[index as usize].next_leaf();
        Some(index)
    }
}

type StageFn<C, T> = Box<dyn Fn(&C, T) + Send + Sync>;
type OnceFn<C> = Box<dyn FnOnce(&C) + Send + Sync>;

/// One stage of a parallel pipeline over a shared context
///
/// Workers entering `run` race to prime the domain and run the setup thunk
/// exactly once, then loop claiming items until the domain dries up. When the
/// last worker lets go, `exhausted` runs the finish thunk and hands the baton
/// to the next stage, if any. The context is held weakly; if it has been
/// dropped the stage does nothing, which is the cancellation path.
pub struct DomainTaskChain<D: TaskDomain, C: Send + Sync + 'static> {
    name: &'static str,
    context: Weak<C>,
    domain: D,
    primed: Mutex<bool>,
    setup: Option<Box<dyn Fn(&C) + Send + Sync>>,
    body: StageFn<C, D::Item>,
    finish: Option<OnceFn<C>>,
    next: Mutex<Option<Box<dyn ParallelTask>>>,
    width: usize,
}

impl<D: TaskDomain, C: Send + Sync + 'static> DomainTaskChain<D, C> {
    /// A stage running `body` once per claimed item
    pub fn new(
        name: &'static str,
        context: &Arc<C>,
        domain: D,
        body: impl Fn(&C, D::Item) + Send + Sync + 'static,
    ) -> DomainTaskChain<D, C> {
        DomainTaskChain {
            name,
            context: Arc::downgrade(context),
            domain,
            primed: Mutex::new(false),
            setup: None,
            body: Box::new(body),
            finish: None,
            next: Mutex::new(None),
            width: usize::MAX,
        }
    }

    /// Run `setup` once before any claims
    pub fn with_setup(mut self, setup: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.setup = Some(Box::new(setup));
        self
    }

    /// Run `finish` once after the last worker departs
    pub fn with_finish(mut self, finish: impl FnOnce(&C) + Send + Sync + 'static) -> Self {
        self.finish = Some(Box::new(finish));
        self
    }

    /// Submit `next` when this stage finishes
    pub fn then(self, next: Box<dyn ParallelTask>) -> Self {
        *self.next.lock() = Some(next);
        self
    }

    /// Cap the number of concurrent workers
    pub fn with_max_parallelism(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }
}

impl<D: TaskDomain, C: Send + Sync + 'static> ParallelTask for DomainTaskChain<D, C> {
    fn run(&self) {
        let Some(context) = self.context.upgrade() else {
            return;
        };
        {
            let mut primed = self.primed.lock();
            if !*primed {
                *primed = true;
                log::debug!("chain stage '{}' starting", self.name);
                self.domain.prime();
                if let Some(setup) = &self.setup {
                    setup(&context);
                }
            }
        }
        while let Some(item) = self.domain.claim() {
            (self.body)(&context, item);
        }
    }

    fn exhausted(&mut self, scheduler: &Scheduler) {
        let Some(context) = self.context.upgrade() else {
            return;
        };
        log::debug!("chain stage '{}' exhausted", self.name);
        if let Some(finish) = self.finish.take() {
            finish(&context);
        }
        if let Some(next) = self.next.get_mut().take() {
            scheduler.enqueue_parallel(next);
        }
    }

    fn max_parallelism(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_index_range_claims_each_once() {
        let range = IndexRange::new(100);
        range.prime();
        let range = Arc::new(range);
        let mut hands = Vec::new();
        for _ in 0..4 {
            let range = Arc::clone(&range);
            hands.push(thread::spawn(move || {
                let mut got = Vec::new();
                while let Some(i) = range.claim() {
                    got.push(i);
                }
                got
            }));
        }
        let mut seen = HashSet::new();
        for hand in hands {
            for i in hand.join().unwrap() {
                assert!(seen.insert(i), "index {} claimed twice", i);
            }
        }
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn test_iter_domain_drains() {
        let domain = IterDomain::new(vec!["a", "b", "c"].into_iter());
        domain.prime();
        assert_eq!(domain.claim(), Some("a"));
        assert_eq!(domain.claim(), Some("b"));
        assert_eq!(domain.claim(), Some("c"));
        assert_eq!(domain.claim(), None);
        assert_eq!(domain.claim(), None);
    }

    #[test]
    fn test_chain_setup_body_finish_order() {
        struct Log {
            events: Mutex<Vec<String>>,
            sum: AtomicUsize,
        }
        let context = Arc::new(Log {
            events: Mutex::new(Vec::new()),
            sum: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::setup(&SchedulerConfig {
            force_single_thread: true,
        });
        let chain = DomainTaskChain::new("sum", &context, IndexRange::new(10), |log: &Log, i| {
            log.sum.fetch_add(i + 1, Ordering::SeqCst);
        })
        .with_setup(|log: &Log| log.events.lock().push("setup".into()))
        .with_finish(|log: &Log| log.events.lock().push("finish".into()));
        scheduler.enqueue_parallel(Box::new(chain));
        scheduler.advance();
        assert_eq!(context.sum.load(Ordering::SeqCst), 55);
        assert_eq!(*context.events.lock(), vec!["setup", "finish"]);
        scheduler.teardown();
    }

    #[test]
    fn test_chain_baton_passes_to_next_stage() {
        struct Tally {
            first: AtomicUsize,
            second: AtomicUsize,
        }
        let context = Arc::new(Tally {
            first: AtomicUsize::new(0),
            second: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::setup(&SchedulerConfig {
            force_single_thread: true,
        });
        let second =
            DomainTaskChain::new("second", &context, IndexRange::new(3), |tally: &Tally, _| {
                tally.second.fetch_add(1, Ordering::SeqCst);
            });
        let first =
            DomainTaskChain::new("first", &context, IndexRange::new(5), |tally: &Tally, _| {
                tally.first.fetch_add(1, Ordering::SeqCst);
            })
            .then(Box::new(second));
        scheduler.enqueue_parallel(Box::new(first));
        // One advance per stage in single-thread mode.
        scheduler.advance();
        scheduler.advance();
        assert_eq!(context.first.load(Ordering::SeqCst), 5);
        assert_eq!(context.second.load(Ordering::SeqCst), 3);
        scheduler.teardown();
    }

    #[test]
    fn test_dropped_context_cancels_stage() {
        let context = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::setup(&SchedulerConfig {
            force_single_thread: true,
        });
        let chain = DomainTaskChain::new(
            "orphan",
            &context,
            IndexRange::new(1000),
            |count: &AtomicUsize, _| {
                count.fetch_add(1, Ordering::SeqCst);
            },
        );
        scheduler.enqueue_parallel(Box::new(chain));
        drop(context);
        scheduler.advance();
        scheduler.teardown();
    }
}
