//! Listener role: turns raw MIDI input into fixed-size note batches.

use std::sync::mpsc::{Receiver, SyncSender};

use tracing::{debug, info, warn};

use crate::mailbox::NoteBuffer;
use crate::midi_io::TimestampedMidiMessage;
use crate::primitives::{NoteBatch, NoteEvent};

/// Accumulates note events until a batch is full.
#[derive(Debug)]
pub struct Batcher {
    batch_size: usize,
    batch: NoteBatch,
}

impl Batcher {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            batch: Vec::with_capacity(batch_size),
        }
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Add a message; returns the batch once it reaches the batch size.
    /// Anything that is not a note is ignored.
    pub fn push(&mut self, input: &TimestampedMidiMessage) -> Option<NoteBatch> {
        let event = NoteEvent::from_message(&input.message, input.timestamp())?;
        self.batch.push(event);
        if self.batch.len() < self.batch_size {
            return None;
        }
        Some(std::mem::replace(
            &mut self.batch,
            Vec::with_capacity(self.batch_size),
        ))
    }
}

/// Run the listener until the MIDI input disconnects.
///
/// The note-ons of each full batch are appended to `notes` for the analyzer,
/// then the batch goes to the generator. Appending never blocks, so a busy
/// analyzer cannot hold up the generator. A partial batch left when the input
/// closes is dropped.
pub fn run_listener(
    input: Receiver<TimestampedMidiMessage>,
    batch_size: usize,
    notes: &NoteBuffer,
    generator: SyncSender<NoteBatch>,
) {
    let mut batcher = Batcher::new(batch_size);
    let mut generator = Some(generator);

    for message in input {
        let Some(batch) = batcher.push(&message) else {
            continue;
        };
        debug!(notes = batch.len(), "note batch full");

        notes.push_batch(batch.iter().filter(|e| e.is_on()).map(NoteEvent::pitch_class));
        if let Some(tx) = &generator {
            if tx.send(batch).is_err() {
                warn!("generator stopped taking notes");
                generator = None;
            }
        }
    }

    notes.close();
    info!(dropped = batcher.pending(), "MIDI input closed, listener exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{MidiMessage, NoteKind};
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    fn msg(at_us: u64, message: MidiMessage) -> TimestampedMidiMessage {
        TimestampedMidiMessage {
            timestamp_us: at_us,
            message,
        }
    }

    fn on(at_us: u64, pitch: u8) -> TimestampedMidiMessage {
        msg(
            at_us,
            MidiMessage::NoteOn {
                channel: 0,
                pitch,
                velocity: 90,
            },
        )
    }

    fn off(at_us: u64, pitch: u8) -> TimestampedMidiMessage {
        msg(at_us, MidiMessage::NoteOff { channel: 0, pitch })
    }

    #[test]
    fn batches_fill_to_size() {
        let mut batcher = Batcher::new(3);
        assert!(batcher.push(&on(0, 60)).is_none());
        assert!(batcher.push(&off(10, 60)).is_none());
        let batch = batcher.push(&on(20, 62)).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[1].kind, NoteKind::Off);
        assert_eq!(batcher.pending(), 0);
    }

    #[test]
    fn non_note_messages_are_ignored() {
        let mut batcher = Batcher::new(2);
        let cc = msg(
            0,
            MidiMessage::ControlChange {
                channel: 0,
                controller: 64,
                value: 127,
            },
        );
        assert!(batcher.push(&cc).is_none());
        assert_eq!(batcher.pending(), 0);
    }

    #[test]
    fn zero_velocity_note_on_becomes_note_off() {
        let mut batcher = Batcher::new(1);
        let silent = msg(
            5,
            MidiMessage::NoteOn {
                channel: 0,
                pitch: 64,
                velocity: 0,
            },
        );
        let batch = batcher.push(&silent).unwrap();
        assert_eq!(batch[0].kind, NoteKind::Off);
    }

    #[test]
    fn both_consumers_receive_every_batch() {
        let (input_tx, input_rx) = mpsc::channel();
        let (generator_tx, generator_rx) = mpsc::sync_channel(8);
        let notes = Arc::new(NoteBuffer::new());

        let buffer = Arc::clone(&notes);
        let listener = thread::spawn(move || run_listener(input_rx, 2, &buffer, generator_tx));
        for (i, pitch) in [60, 62, 64, 65, 67].into_iter().enumerate() {
            input_tx.send(on(i as u64 * 1000, pitch)).unwrap();
        }
        drop(input_tx);
        listener.join().unwrap();

        let to_generator: Vec<NoteBatch> = generator_rx.iter().collect();
        assert_eq!(to_generator.len(), 2);
        let pitches: Vec<u8> = to_generator.iter().flatten().map(|e| e.pitch).collect();
        // the fifth note never fills a batch
        assert_eq!(pitches, vec![60, 62, 64, 65]);
        assert_eq!(notes.batches(), 2);
        assert_eq!(notes.take(), vec![0, 2, 4, 5]);
    }

    #[test]
    fn idle_analyzer_never_stalls_the_generator() {
        let (input_tx, input_rx) = mpsc::channel();
        let (generator_tx, generator_rx) = mpsc::sync_channel(2);
        let notes = Arc::new(NoteBuffer::new());

        let buffer = Arc::clone(&notes);
        let listener = thread::spawn(move || run_listener(input_rx, 1, &buffer, generator_tx));
        let generator = thread::spawn(move || generator_rx.iter().count());

        // nobody takes from the note buffer
        for i in 0..10u8 {
            input_tx.send(on(u64::from(i) * 1000, 60 + i)).unwrap();
        }
        drop(input_tx);
        listener.join().unwrap();

        assert_eq!(generator.join().unwrap(), 10);
        assert_eq!(notes.len(), 10);
    }

    #[test]
    fn note_offs_count_as_batches_without_pitches() {
        let (input_tx, input_rx) = mpsc::channel();
        let (generator_tx, generator_rx) = mpsc::sync_channel(4);
        let notes = NoteBuffer::new();

        input_tx.send(off(0, 60)).unwrap();
        drop(input_tx);
        run_listener(input_rx, 1, &notes, generator_tx);

        assert_eq!(generator_rx.iter().count(), 1);
        assert_eq!(notes.batches(), 1);
        assert!(notes.is_empty());
    }

    #[test]
    fn keeps_collecting_after_the_generator_leaves() {
        let (input_tx, input_rx) = mpsc::channel();
        let (generator_tx, generator_rx) = mpsc::sync_channel(1);
        drop(generator_rx);
        let notes = NoteBuffer::new();

        input_tx.send(on(0, 60)).unwrap();
        input_tx.send(on(1000, 64)).unwrap();
        drop(input_tx);
        run_listener(input_rx, 1, &notes, generator_tx);

        assert_eq!(notes.take(), vec![0, 4]);
        assert!(notes.wait_first_batch());
    }
}
