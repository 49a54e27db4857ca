//! The banana mission model.
//!
//! A small but complete model exercising every engine feature:
//!
//! - `fruit`: an [`AccumulatorCell`] published as the real resource `/fruit`.
//! - `producer`: a [`RegisterCell<String>`] published as `/producer`.
//! - `bites`: a [`CounterCell`] published as `/bites`, fed together with
//!   `fruit` from the shared `bite` topic.
//!
//! Activity types:
//!
//! | Type | Parameters | Behavior |
//! |---|---|---|
//! | `PickBanana` | `quantity` = 10.0 | removes `quantity` fruit |
//! | `BiteBanana` | `biteSize` = 0.1 | removes `biteSize` fruit, counts a bite |
//! | `GrowBanana` | `quantity` = 1.0, `growingDuration` = 1s | adds fruit linearly |
//! | `ChangeProducer` | `producer` = "Dole" | sets the producer |
//! | `BasicActivity` | | lasts 2s |
//! | `ControllableDurationActivity` | `duration` (required) | lasts `duration` |
//! | `ParentActivity` | | spawns a `BasicActivity` and a `BiteBanana` |
//! | `FailingActivity` | | fails after 1s |
//! | `WaitForFruit` | `threshold` (required) | waits until fruit reaches `threshold` |

use std::sync::Arc;

use serde_json::json;
use sortie_cells::{AccumulatorCell, CounterCell, CounterEffect, LinearEffect, RegisterCell, SetEffect};
use sortie_core::{CellRef, Duration, Parameter, SerializedActivity, Topic, ValueSchema};
use sortie_engine::{
    arg_duration, arg_f64, arg_str, one_shot, task_fn, when_at_least, ActivityType, Constraint,
    MissionModel, ModelError, Task, TaskFailure, TaskStatus,
};
use sortie_history::Querier;

/// Tunables for [`Banana::build`].
#[derive(Clone, Debug, PartialEq)]
pub struct BananaConfig {
    /// Fruit at t=0.
    pub initial_fruit: f64,
    /// Fruit change per second at t=0.
    pub fruit_rate: f64,
    /// Number of 10s ticks of the ripening daemon. Zero registers no daemon.
    pub ripening_ticks: u32,
}

impl Default for BananaConfig {
    fn default() -> Self {
        Self {
            initial_fruit: 4.0,
            fruit_rate: 0.0,
            ripening_ticks: 0,
        }
    }
}

/// The built banana model plus handles to its cells and topics.
pub struct Banana {
    pub model: Arc<MissionModel>,
    pub fruit: CellRef<AccumulatorCell>,
    pub fruit_topic: Topic<LinearEffect>,
    pub producer: CellRef<RegisterCell<String>>,
    pub producer_topic: Topic<SetEffect<String>>,
    pub bites: CellRef<CounterCell>,
    pub bite_topic: Topic<f64>,
}

/// Producers the model's constraint accepts.
pub const KNOWN_PRODUCERS: [&str; 2] = ["Chiquita", "Dole"];

impl Banana {
    /// The default banana model.
    pub fn new() -> Result<Self, ModelError> {
        Self::build(&BananaConfig::default())
    }

    pub fn build(config: &BananaConfig) -> Result<Self, ModelError> {
        let mut b = MissionModel::builder();
        let (fruit, fruit_topic) = b.allocate_with_topic(
            "fruit",
            AccumulatorCell::new(config.initial_fruit, config.fruit_rate),
        );
        let (producer, producer_topic) =
            b.allocate_with_topic("producer", RegisterCell::new("Chiquita".to_owned()));
        let bites = b.allocate("bites", CounterCell::new(0));
        let bite_topic = b.topic::<f64>("bite");
        b.subscribe(&bite_topic, &fruit, |size: &f64| LinearEffect::volume(-size))?;
        b.subscribe(&bite_topic, &bites, |_: &f64| CounterEffect(1))?;

        b.real_resource("/fruit", move |q: &mut Querier<'_>| q.get(&fruit, |c| c.dynamics()))
            .discrete_resource("/producer", move |q: &mut Querier<'_>| {
                q.get(&producer, |c| json!(c.get()))
            })
            .discrete_resource("/bites", move |q: &mut Querier<'_>| q.get(&bites, |c| json!(c.value())));

        b.activity_type(pick_banana(fruit_topic))
            .activity_type(bite_banana(bite_topic))
            .activity_type(grow_banana(fruit_topic))
            .activity_type(change_producer(producer_topic))
            .activity_type(basic_activity())
            .activity_type(controllable_duration())
            .activity_type(parent_activity())
            .activity_type(failing_activity())
            .activity_type(wait_for_fruit(fruit));

        b.constraint(Constraint::real_between(
            "fruit is non-negative",
            "/fruit",
            0.0,
            f64::INFINITY,
        ))
        .constraint(Constraint::discrete_one_of(
            "producer is known",
            "/producer",
            KNOWN_PRODUCERS.iter().map(|p| json!(p)).collect(),
        ));

        if config.ripening_ticks > 0 {
            let ticks = config.ripening_ticks;
            b.daemon("ripener", move || {
                let mut remaining = ticks;
                task_fn(move |ctx| {
                    if remaining == 0 {
                        return Ok(TaskStatus::done());
                    }
                    remaining -= 1;
                    ctx.emit(&fruit_topic, LinearEffect::volume(1.0))?;
                    Ok(TaskStatus::delay(Duration::of(10, Duration::SECOND)?))
                })
            });
        }

        Ok(Self {
            model: Arc::new(b.build()?),
            fruit,
            fruit_topic,
            producer,
            producer_topic,
            bites,
            bite_topic,
        })
    }
}

// ── Activity types ──────────────────────────────────────────────

fn pick_banana(fruit: Topic<LinearEffect>) -> ActivityType {
    ActivityType::new("PickBanana", move |args| {
        let quantity = arg_f64(args, "quantity")?;
        Ok(one_shot(move |ctx| {
            ctx.emit(&fruit, LinearEffect::volume(-quantity))?;
            Ok(())
        }))
    })
    .parameter(Parameter::optional("quantity", ValueSchema::Real, json!(10.0)))
    .validation("quantity must be positive", |args| {
        arg_f64(args, "quantity").is_ok_and(|q| q > 0.0)
    })
}

fn bite_banana(bite: Topic<f64>) -> ActivityType {
    ActivityType::new("BiteBanana", move |args| {
        let size = arg_f64(args, "biteSize")?;
        Ok(one_shot(move |ctx| {
            ctx.emit(&bite, size)?;
            Ok(())
        }))
    })
    .parameter(Parameter::optional("biteSize", ValueSchema::Real, json!(0.1)))
    .validation("bite size must be positive", |args| {
        arg_f64(args, "biteSize").is_ok_and(|s| s > 0.0)
    })
}

fn grow_banana(fruit: Topic<LinearEffect>) -> ActivityType {
    ActivityType::new("GrowBanana", move |args| {
        let quantity = arg_f64(args, "quantity")?;
        let growing = arg_duration(args, "growingDuration")?;
        if !growing.is_positive() {
            return Err(format!("growingDuration must be positive, got {growing}"));
        }
        let rate = quantity / growing.as_seconds();
        let mut growing_started = false;
        Ok(task_fn(move |ctx| {
            if growing_started {
                ctx.emit(&fruit, LinearEffect::rate(-rate))?;
                return Ok(TaskStatus::done());
            }
            growing_started = true;
            ctx.emit(&fruit, LinearEffect::rate(rate))?;
            Ok(TaskStatus::delay(growing))
        }))
    })
    .parameter(Parameter::optional("quantity", ValueSchema::Real, json!(1.0)))
    .parameter(Parameter::optional(
        "growingDuration",
        ValueSchema::Duration,
        json!(Duration::SECOND.as_micros()),
    ))
}

fn change_producer(producer: Topic<SetEffect<String>>) -> ActivityType {
    ActivityType::new("ChangeProducer", move |args| {
        let name = arg_str(args, "producer")?.to_owned();
        Ok(one_shot(move |ctx| {
            ctx.emit(&producer, SetEffect::Set(name))?;
            Ok(())
        }))
    })
    .parameter(Parameter::optional("producer", ValueSchema::String, json!("Dole")))
}

/// Lasts exactly two seconds.
pub const BASIC_DURATION: Duration = Duration::from_micros(2_000_000);

fn basic_activity() -> ActivityType {
    ActivityType::new("BasicActivity", |_| Ok(sleeper(BASIC_DURATION)))
}

fn controllable_duration() -> ActivityType {
    ActivityType::new("ControllableDurationActivity", |args| {
        let duration = arg_duration(args, "duration")?;
        if duration.is_negative() {
            return Err(format!("duration must not be negative, got {duration}"));
        }
        Ok(sleeper(duration))
    })
    .parameter(Parameter::required("duration", ValueSchema::Duration))
}

fn sleeper(duration: Duration) -> Box<dyn Task> {
    let mut slept = false;
    task_fn(move |_| {
        if slept {
            return Ok(TaskStatus::done());
        }
        slept = true;
        Ok(TaskStatus::delay(duration))
    })
}

fn parent_activity() -> ActivityType {
    ActivityType::new("ParentActivity", |_| {
        let mut first_child_done = false;
        Ok(task_fn(move |ctx| {
            if !first_child_done {
                first_child_done = true;
                ctx.spawn_activity(SerializedActivity::new("BasicActivity", Default::default()))?;
                return Ok(TaskStatus::AwaitingChildren);
            }
            // Still live when this returns, so the window ends at its join.
            ctx.spawn_activity(SerializedActivity::new("BiteBanana", Default::default()))?;
            Ok(TaskStatus::done())
        }))
    })
}

fn failing_activity() -> ActivityType {
    ActivityType::new("FailingActivity", |_| {
        let mut waited = false;
        Ok(task_fn(move |_| {
            if waited {
                return Err(TaskFailure::new("the banana went bad"));
            }
            waited = true;
            Ok(TaskStatus::delay(Duration::SECOND))
        }))
    })
}

fn wait_for_fruit(fruit: CellRef<AccumulatorCell>) -> ActivityType {
    ActivityType::new("WaitForFruit", move |args| {
        let threshold = arg_f64(args, "threshold")?;
        let mut waited = false;
        Ok(task_fn(move |ctx| {
            if waited {
                let observed = ctx.query(&fruit, |c| c.volume())?;
                return Ok(TaskStatus::Completed(Some(json!({
                    "observedFruit": observed,
                    "satisfiedAt": ctx.now().as_micros(),
                }))));
            }
            waited = true;
            Ok(TaskStatus::wait_until(when_at_least(
                move |q: &mut Querier<'_>| q.get(&fruit, |c| c.dynamics()),
                threshold,
            )))
        }))
    })
    .parameter(Parameter::required("threshold", ValueSchema::Real))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_builds() {
        let banana = Banana::new().unwrap();
        let model = &banana.model;
        assert_eq!(model.activity_types().count(), 9);
        assert!(model.real_resource("/fruit").is_some());
        assert!(model.discrete_resource("/producer").is_some());
        assert!(model.discrete_resource("/bites").is_some());
        assert_eq!(model.constraints().len(), 2);
    }

    #[test]
    fn defaults_are_filled_in() {
        let banana = Banana::new().unwrap();
        let ty = banana.model.activity_type("PickBanana").unwrap();
        let args = ty.validate_arguments(&Default::default()).unwrap();
        assert_eq!(args.get("quantity"), Some(&json!(10.0)));
    }

    #[test]
    fn validations_flag_non_positive_quantities() {
        let banana = Banana::new().unwrap();
        let pick = SerializedActivity::new("PickBanana", Default::default())
            .with_argument("quantity", json!(-1.0));
        let failed = banana.model.validate_activity(&pick).unwrap();
        assert_eq!(failed, vec!["quantity must be positive".to_owned()]);
    }
}
