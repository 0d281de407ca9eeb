/*
    fluxforge
    https://github.com/fluxforge/fluxforge

    Copyright 2025 the fluxforge authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/driver.rs

    The decoder driver: walks the configured (track, side) range, decodes
    each track, and streams sectors to an image writer in (track, side)
    ascending order no matter which worker finished first. Progress is a
    stream of events the caller iterates.
*/

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{
    config::{Config, DecoderConfig},
    decoder::decode_track,
    sector::{Sector, StatusCounts, TrackLocation, TrackSectors},
    source::{kryoflux::StreamFluxSink, FluxSink, FluxSource},
    FluxError,
};

const EVENT_QUEUE_DEPTH: usize = 64;
const RESULT_QUEUE_DEPTH: usize = 8;

/// Cooperative cancellation. Checked between records, so at most one
/// sector decode of latency before a worker stops.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress reported while a decode runs. `TrackStarted` arrives in
/// completion order when workers run in parallel; `TrackCompleted` and the
/// sectors behind it are always in (track, side) order.
#[derive(Clone, Debug)]
pub enum DecodeEvent {
    TrackStarted {
        location: TrackLocation,
    },
    TrackCompleted {
        location: TrackLocation,
        counts:   StatusCounts,
    },
    TrackFailed {
        location: TrackLocation,
        message:  String,
    },
    Finished,
}

#[derive(Clone, Debug)]
pub struct TrackSummary {
    pub location: TrackLocation,
    pub counts:   StatusCounts,
}

#[derive(Clone, Debug, Default)]
pub struct DecodeSummary {
    pub tracks: Vec<TrackSummary>,
}

impl DecodeSummary {
    /// A run failed if any configured track produced no verified sector.
    pub fn failed(&self) -> bool {
        self.tracks.iter().any(|track| track.counts.ok == 0)
    }

    pub fn totals(&self) -> StatusCounts {
        let mut totals = StatusCounts::default();
        for track in &self.tracks {
            totals.add(&track.counts);
        }
        totals
    }
}

/// Consumes decoded sectors, in (track, side, sector) ascending order.
pub trait ImageWriter {
    fn write_sector(&mut self, sector: &Sector) -> Result<(), FluxError>;

    fn finish(&mut self) -> Result<(), FluxError> {
        Ok(())
    }
}

/// Collects sectors in memory.
#[derive(Debug, Default)]
pub struct MemoryImageWriter {
    pub sectors: Vec<Sector>,
}

impl MemoryImageWriter {
    pub fn new() -> Self {
        Default::default()
    }
}

impl ImageWriter for MemoryImageWriter {
    fn write_sector(&mut self, sector: &Sector) -> Result<(), FluxError> {
        self.sectors.push(sector.clone());
        Ok(())
    }
}

/// A running decode. Iterating yields progress events; [`DecodeSession::finish`]
/// joins the run and hands back the summary and the writer.
pub struct DecodeSession<W> {
    events: Option<Receiver<DecodeEvent>>,
    handle: Option<thread::JoinHandle<Result<(DecodeSummary, W), FluxError>>>,
    cancel: CancelToken,
}

impl<W> Iterator for DecodeSession<W> {
    type Item = DecodeEvent;

    fn next(&mut self) -> Option<DecodeEvent> {
        self.events.as_ref()?.recv().ok()
    }
}

impl<W> DecodeSession<W> {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the run to end. Pending events are discarded.
    pub fn finish(mut self) -> Result<(DecodeSummary, W), FluxError> {
        // Dropping the receiver first unblocks any event send in flight.
        self.events.take();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| FluxError::DriverPanic)?,
            None => Err(FluxError::DriverPanic),
        }
    }
}

/// Decode every configured track of a disk. Returns immediately; the work
/// runs on a driver thread (plus workers, when the source is reentrant and
/// the configuration allows it).
pub fn decode_disk<S, W>(config: Arc<Config>, source: S, writer: W) -> DecodeSession<W>
where
    S: FluxSource + 'static,
    W: ImageWriter + Send + 'static,
{
    let (event_tx, event_rx) = bounded(EVENT_QUEUE_DEPTH);
    let cancel = CancelToken::new();
    let thread_cancel = cancel.clone();

    let handle = thread::spawn(move || run(config, source, writer, event_tx, thread_cancel));

    DecodeSession {
        events: Some(event_rx),
        handle: Some(handle),
        cancel,
    }
}

fn run<S, W>(
    config: Arc<Config>,
    source: S,
    mut writer: W,
    events: Sender<DecodeEvent>,
    cancel: CancelToken,
) -> Result<(DecodeSummary, W), FluxError>
where
    S: FluxSource,
    W: ImageWriter,
{
    let decoder_config = &config.decoder;
    let locations: Vec<TrackLocation> = (decoder_config.first_track..=decoder_config.last_track)
        .flat_map(|track| (0..decoder_config.sides).map(move |side| TrackLocation::new(track, side)))
        .collect();

    let sink = match &decoder_config.copy_flux_to {
        Some(dir) => Some(StreamFluxSink::new(dir)?),
        None => None,
    };

    let worker_ct = if decoder_config.parallel && source.is_reentrant() && locations.len() > 1 {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(locations.len())
    }
    else {
        1
    };

    log::debug!(
        "run(): decoding {} tracks with {} worker(s), variant {}",
        locations.len(),
        worker_ct,
        decoder_config.variant
    );

    let mut summary = DecodeSummary::default();

    if worker_ct > 1 {
        let (result_tx, result_rx) =
            bounded::<(usize, Result<TrackSectors, FluxError>)>(RESULT_QUEUE_DEPTH);
        let next_location = AtomicUsize::new(0);

        thread::scope(|scope| -> Result<(), FluxError> {
            for _ in 0..worker_ct {
                let result_tx = result_tx.clone();
                let events = events.clone();
                let locations = &locations;
                let next_location = &next_location;
                let source = &source;
                let sink = sink.as_ref();
                let cancel = &cancel;
                let decoder_config = &config.decoder;

                scope.spawn(move || loop {
                    let idx = next_location.fetch_add(1, Ordering::Relaxed);
                    if idx >= locations.len() || cancel.is_cancelled() {
                        break;
                    }
                    let location = locations[idx];
                    let _ = events.send(DecodeEvent::TrackStarted { location });
                    let result = decode_one(decoder_config, source, sink, location, cancel);
                    if result_tx.send((idx, result)).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);

            // Workers finish out of order; hold results until their turn.
            // On a fatal delivery error, keep draining so no worker stays
            // blocked on the results queue while the scope joins.
            let mut pending: BTreeMap<usize, Result<TrackSectors, FluxError>> = BTreeMap::new();
            let mut next_write = 0usize;
            let mut delivery_error: Option<FluxError> = None;
            for (idx, result) in result_rx.iter() {
                if delivery_error.is_some() {
                    continue;
                }
                pending.insert(idx, result);
                while let Some(result) = pending.remove(&next_write) {
                    if let Err(error) =
                        deliver(locations[next_write], result, &mut writer, &events, &mut summary)
                    {
                        cancel.cancel();
                        delivery_error = Some(error);
                        break;
                    }
                    next_write += 1;
                }
            }
            match delivery_error {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })?;
    }
    else {
        for &location in &locations {
            if cancel.is_cancelled() {
                break;
            }
            let _ = events.send(DecodeEvent::TrackStarted { location });
            let result = decode_one(decoder_config, &source, sink.as_ref(), location, &cancel);
            deliver(location, result, &mut writer, &events, &mut summary)?;
        }
    }

    writer.finish()?;
    let _ = events.send(DecodeEvent::Finished);

    log::debug!("run(): done, {}", summary.totals());
    Ok((summary, writer))
}

fn decode_one<S>(
    config: &DecoderConfig,
    source: &S,
    sink: Option<&StreamFluxSink>,
    location: TrackLocation,
    cancel: &CancelToken,
) -> Result<TrackSectors, FluxError>
where
    S: FluxSource + ?Sized,
{
    let fluxmap = source.read_flux(location.track, location.side)?;
    log::debug!(
        "decode_one(): {} got {} pulses over {:.1} ms",
        location,
        fluxmap.pulse_ct(),
        fluxmap.duration_secs() * 1_000.0
    );
    if let Some(sink) = sink {
        sink.write_flux(location.track, location.side, &fluxmap)?;
    }
    Ok(decode_track(&fluxmap, location, config, cancel))
}

fn deliver<W: ImageWriter>(
    location: TrackLocation,
    result: Result<TrackSectors, FluxError>,
    writer: &mut W,
    events: &Sender<DecodeEvent>,
    summary: &mut DecodeSummary,
) -> Result<(), FluxError> {
    match result {
        Ok(sectors) => {
            for sector in sectors.iter() {
                writer.write_sector(sector)?;
            }
            let counts = sectors.summary();
            let _ = events.send(DecodeEvent::TrackCompleted { location, counts });
            summary.tracks.push(TrackSummary { location, counts });
        }
        Err(error) if error.is_fatal() => {
            let _ = events.send(DecodeEvent::TrackFailed {
                location,
                message: error.to_string(),
            });
            return Err(error);
        }
        Err(error) => {
            // A bad capture loses the track, not the run.
            log::warn!("deliver(): {}: {}", location, error);
            let _ = events.send(DecodeEvent::TrackFailed {
                location,
                message: error.to_string(),
            });
            summary.tracks.push(TrackSummary {
                location,
                counts: StatusCounts::default(),
            });
        }
    }
    Ok(())
}
