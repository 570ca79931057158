//! Calibration session: the ordered tunings and the interaction mode
//!
//! Observers registered with [`Session::subscribe`] are told about every
//! mutation that goes through the session.

use crate::config::CalibratorConfig;
use crate::display::ScreenSetup;
use crate::error::TuningError;
use crate::proj::{ProjectorSetup, Tuning};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Which part of the calibration pointer input targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    ScreenSetup,
    ProjectionSetup,
    Warp,
    Blend,
    Export,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::ScreenSetup,
        Mode::ProjectionSetup,
        Mode::Warp,
        Mode::Blend,
        Mode::Export,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Mode::ScreenSetup => "SCREENSETUP",
            Mode::ProjectionSetup => "PROJECTIONSETUP",
            Mode::Warp => "WARP",
            Mode::Blend => "BLEND",
            Mode::Export => "EXPORT",
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Mode::ScreenSetup => 0,
            Mode::ProjectionSetup => 1,
            Mode::Warp => 2,
            Mode::Blend => 3,
            Mode::Export => 4,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Mode {
    type Error = TuningError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Mode::ALL
            .into_iter()
            .find(|m| m.tag() == tag)
            .ok_or_else(|| TuningError::InvalidMode(tag.to_string()))
    }
}

impl FromStr for Mode {
    type Err = TuningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TuningError::InvalidMode(s.to_string()))
    }
}

/// Change notification sent to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    TuningAdded(usize),
    TuningRemoved(usize),
    TuningChanged(usize),
    ModeChanged(Mode),
}

type Observer = Box<dyn FnMut(&SessionEvent)>;

pub struct Session {
    tunings: Vec<Tuning>,
    mode: Mode,
    config: CalibratorConfig,
    screen_setup: Box<dyn ScreenSetup>,
    setups: Vec<Rc<ProjectorSetup>>,
    observers: Vec<Observer>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tunings", &self.tunings.len())
            .field("mode", &self.mode)
            .field("setups", &self.setups.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Session {
    /// Create an empty session in SCREENSETUP mode
    pub fn new(config: CalibratorConfig, screen_setup: Box<dyn ScreenSetup>) -> Self {
        Self {
            tunings: Vec::new(),
            mode: Mode::default(),
            config,
            screen_setup,
            setups: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    pub fn screen_setup(&self) -> &dyn ScreenSetup {
        self.screen_setup.as_ref()
    }

    /// Swap the display oracle (e.g. after a display reconfiguration)
    pub fn set_screen_setup(&mut self, screen_setup: Box<dyn ScreenSetup>) {
        self.screen_setup = screen_setup;
        self.reconcile_screens();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Change the mode; observers are notified only on an actual change
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode == mode {
            return;
        }
        log::debug!("Session mode {} -> {}", self.mode, mode);
        self.mode = mode;
        self.notify(SessionEvent::ModeChanged(mode));
    }

    /// Register an observer for every later session event
    pub fn subscribe(&mut self, observer: impl FnMut(&SessionEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    pub fn tunings(&self) -> &[Tuning] {
        &self.tunings
    }

    pub fn len(&self) -> usize {
        self.tunings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunings.is_empty()
    }

    /// Tuning at `index`, `None` if out of range
    pub fn tuning(&self, index: usize) -> Option<&Tuning> {
        self.tunings.get(index)
    }

    /// Add a tuning with the next palette color; returns its index
    pub fn add_tuning(&mut self) -> usize {
        let index = self.tunings.len();
        let tuning = Tuning::with_config(self.config.palette_color(index), &self.config);
        self.push_tuning(tuning)
    }

    /// Append an existing tuning; returns its index
    ///
    /// The tuning takes over the standard screen of the display oracle and
    /// its mask is brought to the resulting resolution.
    pub fn push_tuning(&mut self, mut tuning: Tuning) -> usize {
        tuning.set_standard_screen(self.screen_setup.standard_screen());
        let (width, height) = tuning.resolution();
        tuning.blend_mask_mut().ensure_resolution(width, height);
        self.tunings.push(tuning);
        let index = self.tunings.len() - 1;
        log::info!("Added tuning {}", index);
        self.notify(SessionEvent::TuningAdded(index));
        index
    }

    /// Remove and return the tuning at `index`
    pub fn remove_tuning(&mut self, index: usize) -> Result<Tuning, TuningError> {
        if index >= self.tunings.len() {
            return Err(TuningError::NoSuchTuning(index));
        }
        let tuning = self.tunings.remove(index);
        log::info!("Removed tuning {}", index);
        self.notify(SessionEvent::TuningRemoved(index));
        Ok(tuning)
    }

    /// Mutate a tuning and notify observers afterwards
    ///
    /// The closure also receives the display oracle.
    pub fn with_tuning_mut<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Tuning, &dyn ScreenSetup) -> R,
    ) -> Result<R, TuningError> {
        let screen_setup = self.screen_setup.as_ref();
        let tuning = self
            .tunings
            .get_mut(index)
            .ok_or(TuningError::NoSuchTuning(index))?;
        let result = f(tuning, screen_setup);
        self.notify(SessionEvent::TuningChanged(index));
        Ok(result)
    }

    /// Bind a tuning to a screen looked up by id in the display oracle
    pub fn assign_screen(
        &mut self,
        index: usize,
        screen_id: &str,
        sub_screen_index: u32,
    ) -> Result<(), TuningError> {
        let screen = self
            .screen_setup
            .screen(screen_id)
            .ok_or_else(|| TuningError::UnknownScreen(screen_id.to_string()))?;
        self.with_tuning_mut(index, |tuning, _| {
            tuning.set_screen(Some(screen), sub_screen_index)
        })?
    }

    /// Register a projector setup owned by this session
    pub fn add_setup(&mut self, setup: ProjectorSetup) -> Rc<ProjectorSetup> {
        let setup = Rc::new(setup);
        self.setups.push(Rc::clone(&setup));
        setup
    }

    pub fn setups(&self) -> &[Rc<ProjectorSetup>] {
        &self.setups
    }

    /// Re-resolve every tuning's screen against the display oracle
    ///
    /// Screens that changed geometry are refreshed, screens that vanished are
    /// unassigned. Masks with a stale resolution are reset.
    pub fn reconcile_screens(&mut self) {
        let standard = self.screen_setup.standard_screen();
        let mut changed = Vec::new();

        for (index, tuning) in self.tunings.iter_mut().enumerate() {
            let before = tuning.clone();
            tuning.set_standard_screen(standard);

            if let Some(current) = tuning.screen().cloned() {
                let fresh = self.screen_setup.screen(&current.id);
                let sub_index = tuning.sub_screen_index();
                let rebound = match fresh {
                    Some(screen) if sub_index < screen.sub_screens.max(1) => {
                        tuning.set_screen(Some(screen), sub_index).is_ok()
                    }
                    _ => false,
                };
                if !rebound {
                    log::warn!(
                        "Screen '{}' of tuning {} is no longer available, unassigning",
                        current.id,
                        index
                    );
                    // Index 0 is always valid without a screen
                    let _ = tuning.set_screen(None, 0);
                }
            }
            let (width, height) = tuning.resolution();
            tuning.blend_mask_mut().ensure_resolution(width, height);

            if *tuning != before {
                changed.push(index);
            }
        }

        for index in changed {
            self.notify(SessionEvent::TuningChanged(index));
        }
    }

    /// Replace all tunings, e.g. after loading a session file
    pub(crate) fn replace_tunings(&mut self, tunings: Vec<Tuning>, mode: Mode) {
        let removed = self.tunings.len();
        self.tunings = tunings;
        for index in (0..removed).rev() {
            self.notify(SessionEvent::TuningRemoved(index));
        }
        for index in 0..self.tunings.len() {
            self.notify(SessionEvent::TuningAdded(index));
        }
        self.set_mode(mode);
        self.reconcile_screens();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{ScreenInfo, ScreenRect, StaticScreenSetup};
    use std::cell::RefCell;

    fn session_with_screens() -> Session {
        let setup = StaticScreenSetup::new((1280, 720))
            .with_screen(ScreenInfo::new("left", ScreenRect::new(0, 0, 1920, 1200)))
            .with_screen(ScreenInfo::tiled("th", ScreenRect::new(1920, 0, 3840, 1080), 2));
        Session::new(CalibratorConfig::default(), Box::new(setup))
    }

    #[test]
    fn test_mode_parsing_fails_fast() {
        assert_eq!("warp".parse::<Mode>().unwrap(), Mode::Warp);
        assert_eq!(" BLEND ".parse::<Mode>().unwrap(), Mode::Blend);
        assert!(matches!("paint".parse::<Mode>(), Err(TuningError::InvalidMode(_))));

        for mode in Mode::ALL {
            assert_eq!(Mode::try_from(mode.tag()).unwrap(), mode);
        }
        assert!(Mode::try_from(9).is_err());
    }

    #[test]
    fn test_add_tuning_uses_config_and_standard_screen() {
        let mut session = session_with_screens();
        let a = session.add_tuning();
        let b = session.add_tuning();

        assert_eq!((a, b), (0, 1));
        let tuning = session.tuning(1).unwrap();
        assert_eq!(tuning.color(), session.config().palette_color(1));
        assert_eq!(tuning.resolution(), (1280, 720));
        assert_eq!(tuning.blend_mask().resolution(), (1280, 720));
        assert_eq!(tuning.warp_grid().columns(), 6);
    }

    #[test]
    fn test_push_tuning_adopts_standard_screen() {
        let mut session = session_with_screens();
        let index = session.push_tuning(Tuning::default());

        let tuning = session.tuning(index).unwrap();
        assert!(!tuning.has_screen());
        assert_eq!((tuning.width(), tuning.height()), (1280, 720));
        assert_eq!(tuning.blend_mask().resolution(), (1280, 720));
    }

    #[test]
    fn test_observers_see_mutations() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut session = session_with_screens();
        let sink = Rc::clone(&events);
        session.subscribe(move |event| sink.borrow_mut().push(*event));

        session.add_tuning();
        session.set_mode(Mode::Warp);
        session.set_mode(Mode::Warp);
        session
            .with_tuning_mut(0, |tuning, _| tuning.warp_grid_mut().select_all())
            .unwrap();
        session.remove_tuning(0).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                SessionEvent::TuningAdded(0),
                SessionEvent::ModeChanged(Mode::Warp),
                SessionEvent::TuningChanged(0),
                SessionEvent::TuningRemoved(0),
            ]
        );
        assert!(matches!(session.remove_tuning(0), Err(TuningError::NoSuchTuning(0))));
    }

    #[test]
    fn test_assign_screen() {
        let mut session = session_with_screens();
        session.add_tuning();

        session.assign_screen(0, "th", 1).unwrap();
        assert_eq!(session.tuning(0).unwrap().resolution(), (1920, 1080));

        assert!(matches!(
            session.assign_screen(0, "th", 2),
            Err(TuningError::SubScreenOutOfRange { .. })
        ));
        assert!(matches!(
            session.assign_screen(0, "nope", 0),
            Err(TuningError::UnknownScreen(_))
        ));
    }

    #[test]
    fn test_reconcile_unassigns_vanished_screen() {
        let mut session = session_with_screens();
        session.add_tuning();
        session.add_tuning();
        session.assign_screen(0, "left", 0).unwrap();
        session.assign_screen(1, "th", 1).unwrap();

        let replacement = StaticScreenSetup::new((1024, 768))
            .with_screen(ScreenInfo::new("left", ScreenRect::new(0, 0, 1600, 900)));
        session.set_screen_setup(Box::new(replacement));

        let left = session.tuning(0).unwrap();
        assert_eq!(left.resolution(), (1600, 900));
        assert_eq!(left.blend_mask().resolution(), (1600, 900));

        let gone = session.tuning(1).unwrap();
        assert!(!gone.has_screen());
        assert_eq!(gone.resolution(), (1024, 768));
        assert_eq!(gone.blend_mask().resolution(), (1024, 768));
    }

    #[test]
    fn test_setups_are_session_owned() {
        let mut session = session_with_screens();
        session.add_tuning();
        let setup = session.add_setup(ProjectorSetup::Peripheral {
            yaw: 45.0,
            distance_center: 1.0,
            tower_height: 0.5,
            shift: 0.0,
            pitch: 20.0,
            roll: 0.0,
        });
        session
            .with_tuning_mut(0, |tuning, _| tuning.set_setup(&setup))
            .unwrap();
        drop(setup);

        let tuning = session.tuning(0).unwrap();
        assert!(tuning.setup().unwrap().upgrade().is_some());
        assert_eq!(tuning.projector().yaw(), 45.0);
    }
}
