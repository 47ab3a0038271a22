//! Periodic background refresh of tariffs, costs and consumption.
//!
//! Every task owns a single-slot mailbox: a newer value replaces the older one, and readers only
//! ever see the latest.

use std::{sync::Arc, time::Duration};

use bon::Builder;
use chrono::{Local, NaiveDateTime};
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, info_span};

use crate::{
    core::{Calculator, ConsumptionSample},
    prelude::*,
    provider::TariffProvider,
    quantity::{cost::Cost, power::Kilowatts},
    tariff::{Category, Tariff},
};

/// Read side of a monitor mailbox.
#[derive(Clone)]
pub struct Latest<T>(watch::Receiver<Option<T>>);

impl<T: Clone> Latest<T> {
    /// The newest value, or `None` until the first successful iteration.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.0.borrow().clone()
    }

    /// Waits for a value newer than the last one seen, returns `false` once the task is gone.
    pub async fn changed(&mut self) -> bool {
        self.0.changed().await.is_ok()
    }
}

/// Dropping the handle cancels its task.
pub struct MonitorHandle<T> {
    latest: Latest<T>,
    guard: DropGuard,
    task: JoinHandle<()>,
}

impl<T: Clone> MonitorHandle<T> {
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.latest.get()
    }

    #[must_use]
    pub fn subscribe(&self) -> Latest<T> {
        self.latest.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the task and waits for it to exit.
    pub async fn stop(self) {
        let Self { guard, task, .. } = self;
        drop(guard);
        if let Err(error) = task.await {
            warn!(%error, "Monitor task failed");
        }
    }
}

#[derive(Builder)]
pub struct Monitor {
    calculator: Arc<Calculator>,

    #[builder(into)]
    interval: Duration,

    /// Cancelling it stops every task spawned by this monitor.
    #[builder(default)]
    token: CancellationToken,
}

impl Monitor {
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    fn provider(&self) -> &dyn TariffProvider {
        self.calculator.provider()
    }

    pub fn watch_tariffs(&self) -> MonitorHandle<Vec<Arc<Tariff>>> {
        let calculator = self.calculator.clone();
        self.spawn("tariffs", move || calculator.provider().list_tariffs())
    }

    /// Fails right away when the tariff is not known.
    pub fn watch_tariff(&self, tariff_id: &str) -> Result<MonitorHandle<Arc<Tariff>>> {
        self.provider().require_tariff(tariff_id)?;
        let calculator = self.calculator.clone();
        let tariff_id = tariff_id.to_owned();
        Ok(self.spawn("tariff", move || calculator.tariff(&tariff_id)))
    }

    /// Instantaneous cost of the usage, re-evaluated at the current local time.
    pub fn watch_cost(
        &self,
        tariff_id: &str,
        category: Category,
        usage: Kilowatts,
    ) -> Result<MonitorHandle<Cost>> {
        self.provider().require_tariff(tariff_id)?;
        let calculator = self.calculator.clone();
        let tariff_id = tariff_id.to_owned();
        Ok(self.spawn("cost", move || calculator.get_cost(&tariff_id, category, now(), usage)))
    }

    /// Timestamps the usage with the current local time on every iteration.
    pub fn record_consumption(&self, usage: Kilowatts) -> MonitorHandle<ConsumptionSample> {
        self.spawn("consumption", move || Ok(ConsumptionSample { at: now(), magnitude: usage }))
    }

    fn spawn<T, F>(&self, name: &'static str, compute: F) -> MonitorHandle<T>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Result<T> + Send + 'static,
    {
        let token = self.token.child_token();
        let (sender, receiver) = watch::channel(None);
        let task = tokio::spawn(
            run(compute, sender, self.interval, token.clone())
                .instrument(info_span!("monitor", name)),
        );
        MonitorHandle { latest: Latest(receiver), guard: token.drop_guard(), task }
    }
}

async fn run<T, F>(
    mut compute: F,
    sender: watch::Sender<Option<T>>,
    interval: Duration,
    token: CancellationToken,
) where
    F: FnMut() -> Result<T>,
{
    debug!("Started");
    while !token.is_cancelled() {
        match compute() {
            Ok(value) => {
                sender.send_replace(Some(value));
            }
            Err(error) => {
                warn!(%error, "Iteration failed, keeping the previous value");
            }
        }
        tokio::select! {
            () = token.cancelled() => {}
            () = sleep(interval) => {}
        }
    }
    debug!("Stopped");
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
