//! The control loop tying input, allocation and the bus together.
//!
//! A cycle starts with a full device reset and patch upload, then settles
//! into servicing: note events are pulled from the input ring, turned into
//! register writes on the per-device queues, and the queues are drained to
//! empty through the link. A fault frame aborts the current traffic, dumps
//! the diagnostics and backs off before the caller decides whether to start
//! a fresh cycle.

use std::time::Duration;

use crate::bus::fault::FaultFrame;
use crate::bus::link::BusLink;
use crate::bus::port::BusPort;
use crate::bus::sync::{synchronize, SyncResult};
use crate::chip;
use crate::note::{NoteEvent, NoteOutput};
use crate::queue::CommandQueues;
use crate::voice::{AssignmentKind, VoiceAllocator};
use crate::{CHANNELS_PER_DEVICE, DEVICE_COUNT};

/// Pause after a fault dump before traffic resumes.
pub const FAULT_COOLDOWN: Duration = Duration::from_millis(1000);

/// Poll interval while waiting for the bridge's ready line.
const READY_POLL: Duration = Duration::from_nanos(1);

/// How a startup cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Synchronized and fully prepared; ready for note traffic.
    Ready,
    /// Bit alignment could not be established.
    SyncFailed(SyncResult),
    /// The patch upload hit a fault frame.
    Faulted(FaultFrame),
}

/// What one service pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// No pending events and nothing to transmit.
    Idle,
    /// This many note events were handled and their writes drained.
    Played(usize),
    /// A fault frame arrived; queues were cleared and the cooldown served.
    Faulted(FaultFrame),
}

/// Synth controller over any [`BusPort`].
#[derive(Debug)]
pub struct Controller<P: BusPort> {
    link: BusLink<P>,
    queues: CommandQueues,
    allocator: VoiceAllocator,
    notes: NoteOutput,
}

impl<P: BusPort> Controller<P> {
    pub fn new(port: P, notes: NoteOutput) -> Self {
        Self {
            link: BusLink::new(port),
            queues: CommandQueues::new(),
            allocator: VoiceAllocator::new(),
            notes,
        }
    }

    /// Run one startup cycle: queue the patch upload, reset the devices,
    /// synchronize and drain the upload.
    ///
    /// Queues are cleared first so a retried cycle never uploads twice.
    pub fn start_cycle(&mut self) -> CycleOutcome {
        self.queues.clear();
        self.allocator.reset();

        for device in 0..DEVICE_COUNT as u8 {
            for channel in 0..CHANNELS_PER_DEVICE as u8 {
                chip::prepare_voice(&mut self.queues, self.link.port_mut(), device, channel);
            }
        }
        log::info!(
            "{} commands queued per device, resetting",
            self.queues.pending_len(0)
        );

        self.link.transport_mut().reset_device();
        while !self.link.port_mut().read_latched() {
            self.link.port_mut().delay(READY_POLL);
        }

        log::info!("synchronizing");
        let sync = synchronize(self.link.transport_mut());
        if !sync.success {
            return CycleOutcome::SyncFailed(sync);
        }

        if let Some(frame) = self.drain_to_empty() {
            self.fault_recover(&frame);
            return CycleOutcome::Faulted(frame);
        }
        log::info!("ready");
        CycleOutcome::Ready
    }

    /// One pass of the steady-state loop: pump pending note events into the
    /// queues, then drain everything to the wire.
    pub fn service(&mut self) -> ServiceOutcome {
        let mut handled = 0;
        while let Some(event) = self.notes.pop() {
            self.handle_note(event);
            handled += 1;
        }

        if handled == 0 && self.queues.total_pending() == 0 {
            return ServiceOutcome::Idle;
        }
        match self.drain_to_empty() {
            Some(frame) => {
                self.fault_recover(&frame);
                ServiceOutcome::Faulted(frame)
            }
            None => ServiceOutcome::Played(handled),
        }
    }

    fn handle_note(&mut self, event: NoteEvent) {
        if event.on {
            let assignment = self.allocator.note_on(event.key);
            if let AssignmentKind::Stolen { evicted } = assignment.kind {
                log::debug!(
                    "stealing slot {} from key {} for key {}",
                    assignment.slot,
                    evicted,
                    event.key
                );
                chip::queue_note_off(
                    &mut self.queues,
                    self.link.port_mut(),
                    assignment.device,
                    assignment.channel,
                );
            }
            // A reused slot still holds its patch; fresh and stolen slots
            // are re-prepared before the note sounds.
            if assignment.kind != AssignmentKind::Reused {
                chip::prepare_voice(
                    &mut self.queues,
                    self.link.port_mut(),
                    assignment.device,
                    assignment.channel,
                );
            }
            chip::queue_note_on(
                &mut self.queues,
                self.link.port_mut(),
                assignment.device,
                assignment.channel,
                event.frequency_hz,
            );
        } else if let Some(release) = self.allocator.note_off(event.key) {
            chip::queue_note_off(
                &mut self.queues,
                self.link.port_mut(),
                release.device,
                release.channel,
            );
        }
    }

    fn drain_to_empty(&mut self) -> Option<FaultFrame> {
        loop {
            let step = self.queues.drain_step(&mut self.link);
            if let Some(frame) = step.fault {
                return Some(frame);
            }
            if step.remaining == 0 {
                return None;
            }
        }
    }

    fn fault_recover(&mut self, frame: &FaultFrame) {
        frame.dump();
        self.queues.clear();
        self.link.port_mut().delay(FAULT_COOLDOWN);
    }

    /// Run forever: start cycles until one is ready, then service. A fault
    /// during service starts a fresh cycle.
    pub fn run(&mut self) -> ! {
        loop {
            match self.start_cycle() {
                CycleOutcome::Ready => {}
                CycleOutcome::SyncFailed(result) => {
                    log::warn!("synchronization failed after {} attempts", result.attempts);
                    continue;
                }
                CycleOutcome::Faulted(_) => continue,
            }
            loop {
                self.link.port_mut().delay(Duration::from_micros(1));
                if let ServiceOutcome::Faulted(_) = self.service() {
                    break;
                }
            }
        }
    }

    pub fn queues(&self) -> &CommandQueues {
        &self.queues
    }

    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    pub fn port(&self) -> &P {
        self.link.port()
    }

    pub fn port_mut(&mut self) -> &mut P {
        self.link.port_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::SimBus;
    use crate::chip::KEY_REGISTER;
    use crate::note::{note_channel, NoteEvent, NOTE_QUEUE_CAPACITY};

    fn ready_controller() -> (Controller<SimBus>, crate::note::NoteInput) {
        let (input, output) = note_channel(NOTE_QUEUE_CAPACITY);
        let mut controller = Controller::new(SimBus::new(), output);
        assert_eq!(controller.start_cycle(), CycleOutcome::Ready);
        controller.port_mut().take_writes();
        (controller, input)
    }

    #[test]
    fn test_start_cycle_uploads_patch() {
        let (input, output) = note_channel(NOTE_QUEUE_CAPACITY);
        let mut controller = Controller::new(SimBus::new(), output);
        drop(input);

        assert_eq!(controller.start_cycle(), CycleOutcome::Ready);
        // Per device: 3 globals + 6 channels * (1 + 28 + 4) rows.
        let per_device = 3 + 6 * 33;
        let writes = controller.port().writes();
        assert_eq!(writes.len(), per_device * DEVICE_COUNT);
        assert_eq!(controller.queues().total_pending(), 0);
    }

    #[test]
    fn test_start_cycle_fails_on_dead_line() {
        let (_input, output) = note_channel(NOTE_QUEUE_CAPACITY);
        let mut controller = Controller::new(SimBus::dead_line(), output);
        match controller.start_cycle() {
            CycleOutcome::SyncFailed(result) => {
                assert_eq!(result.attempts, 100);
                assert!(!result.success);
            }
            other => panic!("expected sync failure, got {:?}", other),
        }
    }

    #[test]
    fn test_note_on_reaches_key_register() {
        let (mut controller, mut input) = ready_controller();
        input.push(NoteEvent::on(69).unwrap());

        assert_eq!(controller.service(), ServiceOutcome::Played(1));
        let writes = controller.port().writes();
        let key_on = writes
            .iter()
            .find(|w| w.address == KEY_REGISTER && w.data & 0xF0 == 0xF0)
            .expect("no key-on strobe");
        assert_eq!(key_on.data, 0xF0);
        assert_eq!(key_on.device, 0);
    }

    #[test]
    fn test_note_off_releases_channel() {
        let (mut controller, mut input) = ready_controller();
        input.push(NoteEvent::on(60).unwrap());
        controller.service();
        controller.port_mut().take_writes();

        input.push(NoteEvent::off(60).unwrap());
        assert_eq!(controller.service(), ServiceOutcome::Played(1));
        let writes = controller.port().writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].address, KEY_REGISTER);
        assert_eq!(writes[0].data, 0x00);
    }

    #[test]
    fn test_thirteenth_note_steals_and_releases_first() {
        let (mut controller, mut input) = ready_controller();
        for key in 60..72 {
            input.push(NoteEvent::on(key).unwrap());
        }
        controller.service();
        controller.port_mut().take_writes();

        input.push(NoteEvent::on(72).unwrap());
        controller.service();
        let writes = controller.port().writes();
        // The steal releases device 0 channel 0 before re-preparing it.
        assert_eq!(writes[0].address, KEY_REGISTER);
        assert_eq!(writes[0].data, 0x00);
        let key_on = writes
            .iter()
            .find(|w| w.address == KEY_REGISTER && w.data & 0xF0 == 0xF0)
            .expect("no key-on strobe");
        assert_eq!(key_on.data, 0xF0);
        assert_eq!(controller.allocator().sounding_key(0), Some(72));
    }

    #[test]
    fn test_fault_during_service_recovers() {
        let (mut controller, mut input) = ready_controller();
        input.push(NoteEvent::on(69).unwrap());
        controller.port_mut().inject_fault(0xF9, &[0x00, 0x02]);

        let before = controller.port().total_delay();
        match controller.service() {
            ServiceOutcome::Faulted(frame) => assert_eq!(frame.code, 0xF9),
            other => panic!("expected fault, got {:?}", other),
        }
        assert_eq!(controller.queues().total_pending(), 0);
        let cooled = controller.port().total_delay() - before;
        assert!(cooled >= FAULT_COOLDOWN);
    }

    #[test]
    fn test_idle_service_is_a_no_op() {
        let (mut controller, _input) = ready_controller();
        assert_eq!(controller.service(), ServiceOutcome::Idle);
        assert!(controller.port().writes().is_empty());
    }
}
