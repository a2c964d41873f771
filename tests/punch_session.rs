//! End-to-end runs: scripted raw IMU data through the sensor and the meter.

use std::{cell::Cell, cell::RefCell, rc::Rc};

use punch_watch::{
    config::STANDARD_GRAVITY, AccelSource, Callbacks, LinearAccelerationSensor, MeterConfig,
    PunchMeter, SensorEvent, SessionEnd, SessionReport, Stage,
};

const G: f32 = STANDARD_GRAVITY;

#[derive(Clone, Copy)]
enum Phase {
    Rest,
    Shake,
    Punch,
    Fault,
}

/// Raw accelerometer driven by a shared clock and a motion script.
struct ScriptedImu {
    clock: Rc<Cell<u64>>,
    script: fn(u64) -> Phase,
}

impl AccelSource for ScriptedImu {
    type Error = &'static str;

    fn read_accel(&mut self) -> Result<[f32; 3], Self::Error> {
        let t = self.clock.get();
        match (self.script)(t) {
            Phase::Rest => Ok([0.0, 0.0, G]),
            // Alternate direction every sample period.
            Phase::Shake => Ok([if (t / 17) % 2 == 0 { 40.0 } else { -40.0 }, 0.0, G]),
            Phase::Punch => {
                let x = if t < 1_100 { 60.0 } else { -60.0 };
                Ok([x, 0.0, G])
            }
            Phase::Fault => Err("bus timeout"),
        }
    }
}

fn punch_script(t: u64) -> Phase {
    match t {
        500..=699 => Phase::Shake,
        1_000..=1_199 => Phase::Punch,
        _ => Phase::Rest,
    }
}

fn idle_script(t: u64) -> Phase {
    match t {
        500..=699 => Phase::Shake,
        _ => Phase::Rest,
    }
}

fn faulty_script(t: u64) -> Phase {
    match t {
        500..=699 => Phase::Shake,
        1_000..=1_019 => Phase::Fault,
        _ => Phase::Rest,
    }
}

struct Rig {
    clock: Rc<Cell<u64>>,
    sensor: LinearAccelerationSensor<ScriptedImu>,
    reports: Rc<RefCell<Vec<SessionReport>>>,
    punches: Rc<Cell<u32>>,
}

type Meter = PunchMeter<Callbacks<Box<dyn FnMut(&SessionReport)>, Box<dyn FnMut()>>>;

fn rig(script: fn(u64) -> Phase) -> (Rig, Meter) {
    let config = MeterConfig::default();
    let clock = Rc::new(Cell::new(0));
    let sensor = LinearAccelerationSensor::new(
        ScriptedImu {
            clock: clock.clone(),
            script,
        },
        &config,
    );

    let reports = Rc::new(RefCell::new(Vec::new()));
    let punches = Rc::new(Cell::new(0));
    let on_result: Box<dyn FnMut(&SessionReport)> = {
        let reports = reports.clone();
        Box::new(move |r: &SessionReport| reports.borrow_mut().push(*r))
    };
    let on_punch: Box<dyn FnMut()> = {
        let punches = punches.clone();
        Box::new(move || punches.set(punches.get() + 1))
    };
    let meter = PunchMeter::new(
        Callbacks::new(on_result).with_punch_detected(on_punch),
        config,
    )
    .unwrap();

    (
        Rig {
            clock,
            sensor,
            reports,
            punches,
        },
        meter,
    )
}

impl Rig {
    /// Run the cooperative loop with a 1 ms tick up to `until_ms`.
    fn run(&mut self, meter: &mut Meter, until_ms: u64) -> Vec<SensorEvent> {
        let mut seen = Vec::new();
        while self.clock.get() < until_ms {
            let now = self.clock.get();
            for event in self.sensor.poll(now as f64).iter() {
                meter.handle(event, now);
                seen.push(*event);
            }
            meter.tick(now);
            self.clock.set(now + 1);
        }
        seen
    }
}

#[test]
fn shake_still_punch_reports_peak_speed() {
    let (mut rig, mut meter) = rig(punch_script);
    rig.sensor.start(0.0);

    rig.run(&mut meter, 499);
    assert_eq!(meter.stage(), Stage::Arming);

    rig.run(&mut meter, 800);
    assert_eq!(meter.stage(), Stage::Measuring);
    assert!(!meter.gate().is_active());

    rig.run(&mut meter, 1_400);
    assert_eq!(meter.stage(), Stage::Cooldown);

    let reports = rig.reports.borrow().clone();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].end, SessionEnd::Decay);
    assert!(
        (19..=24).contains(&reports[0].speed_kmh),
        "got {} km/h",
        reports[0].speed_kmh
    );
    assert_eq!(rig.punches.get(), 1);

    // Re-armed one cooldown after the result.
    rig.run(&mut meter, 2_300);
    assert_eq!(meter.stage(), Stage::Arming);
    assert_eq!(rig.reports.borrow().len(), 1);
}

#[test]
fn no_punch_times_out_with_zero() {
    let (mut rig, mut meter) = rig(idle_script);
    rig.sensor.start(0.0);

    rig.run(&mut meter, 800);
    assert_eq!(meter.stage(), Stage::Measuring);

    rig.run(&mut meter, 5_600);
    assert_eq!(meter.stage(), Stage::Measuring);

    rig.run(&mut meter, 5_800);
    assert_eq!(meter.stage(), Stage::Cooldown);
    let reports = rig.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].end, SessionEnd::Timeout);
    assert_eq!(reports[0].speed_kmh, 0);
    assert_eq!(rig.punches.get(), 0);
}

#[test]
fn sensor_fault_aborts_until_restart() {
    let (mut rig, mut meter) = rig(faulty_script);
    rig.sensor.start(0.0);

    rig.run(&mut meter, 800);
    assert_eq!(meter.stage(), Stage::Measuring);

    let events = rig.run(&mut meter, 7_000);
    assert!(events.contains(&SensorEvent::Error));
    assert_eq!(meter.stage(), Stage::Faulted);
    assert!(!rig.sensor.is_running());
    assert!(rig.reports.borrow().is_empty());

    let now = rig.clock.get();
    rig.sensor.start(now as f64);
    let events = rig.run(&mut meter, now + 50);
    assert_eq!(events.first(), Some(&SensorEvent::Activated));
    assert_eq!(meter.stage(), Stage::Arming);
}

#[test]
fn latest_sample_appears_after_first_poll() {
    let (mut rig, _) = rig(idle_script);
    assert_eq!(rig.sensor.latest(), None);
    rig.sensor.start(0.0);
    rig.sensor.poll(0.0);
    assert!(rig.sensor.latest().is_some());
}
