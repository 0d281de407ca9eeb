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

    tests/aeslanier.rs

    End-to-end decodes of synthesized AES Lanier tracks, from flux to
    sectors.
*/

mod common;

use common::{aeslanier_fluxmap, aeslanier_payload, aeslanier_record, init};
use fluxforge::{
    config::{ConfigBuilder, DecoderConfig},
    decoder::{decode_track, DecoderVariant},
    driver::CancelToken,
    sector::{SectorStatus, TrackLocation, TrackSectors},
    Fluxmap,
};

fn test_config() -> DecoderConfig {
    let mut config = ConfigBuilder::for_variant(DecoderVariant::AesLanier)
        .build()
        .unwrap()
        .decoder;
    // Only synthesized sectors should appear in the results.
    config.expected_sectors = None;
    config
}

fn decode(fluxmap: &Fluxmap, config: &DecoderConfig) -> TrackSectors {
    decode_track(fluxmap, TrackLocation::new(0, 0), config, &CancelToken::new())
}

#[test]
fn good_record_decodes_to_a_verified_sector() {
    init();
    let record = aeslanier_record(5, 3, 0xAA);
    let fluxmap = aeslanier_fluxmap(&[record.clone()]);
    let sectors = decode(&fluxmap, &test_config());

    assert_eq!(sectors.len(), 1);
    let sector = sectors.get(3).expect("sector 3 not decoded");
    assert_eq!(sector.logical_track, 5);
    assert_eq!(sector.logical_side, 0);
    assert_eq!(sector.logical_sector, 3);
    assert_eq!(sector.status, SectorStatus::Ok);
    assert_eq!(sector.payload.len(), 256);
    assert_eq!(sector.payload, aeslanier_payload(&record));
}

#[test]
fn bad_header_sum_drops_the_record_silently() {
    init();
    let mut record = aeslanier_record(5, 3, 0xAA);
    record[3] = 0;
    let fluxmap = aeslanier_fluxmap(&[record]);
    let sectors = decode(&fluxmap, &test_config());
    assert!(sectors.is_empty());
}

#[test]
fn bad_data_checksum_is_reported() {
    init();
    let mut record = aeslanier_record(5, 3, 0xAA);
    record[0x101] = 0;
    record[0x102] = 0;
    let fluxmap = aeslanier_fluxmap(&[record]);
    let sectors = decode(&fluxmap, &test_config());

    assert_eq!(sectors.len(), 1);
    assert_eq!(sectors.get(3).unwrap().status, SectorStatus::BadChecksum);
}

#[test]
fn later_revolution_repairs_a_bad_read() {
    init();
    let good = aeslanier_record(5, 3, 0xAA);
    let mut bad = good.clone();
    bad[0x101] = 0;
    bad[0x102] = 0;

    // Revolution one returns a corrupt read, revolution two a verified one.
    let fluxmap = aeslanier_fluxmap(&[bad, good.clone()]);
    let sectors = decode(&fluxmap, &test_config());

    assert_eq!(sectors.len(), 1);
    let sector = sectors.get(3).unwrap();
    assert_eq!(sector.status, SectorStatus::Ok);
    assert_eq!(sector.payload, aeslanier_payload(&good));
}

#[test]
fn verified_read_survives_a_later_bad_revolution() {
    init();
    let good = aeslanier_record(5, 3, 0xAA);
    let mut bad = good.clone();
    bad[0x101] = 0;
    bad[0x102] = 0;

    let fluxmap = aeslanier_fluxmap(&[good.clone(), bad]);
    let sectors = decode(&fluxmap, &test_config());

    let sector = sectors.get(3).unwrap();
    assert_eq!(sector.status, SectorStatus::Ok);
    assert_eq!(sector.payload, aeslanier_payload(&good));
}

#[test]
fn several_sectors_decode_from_one_track() {
    init();
    let records: Vec<Vec<u8>> = (0..4).map(|s| aeslanier_record(2, s, 0x11 * (s + 1))).collect();
    let fluxmap = aeslanier_fluxmap(&records);
    let sectors = decode(&fluxmap, &test_config());

    assert_eq!(sectors.len(), 4);
    for (s, record) in records.iter().enumerate() {
        let sector = sectors.get(s as u8).unwrap();
        assert_eq!(sector.status, SectorStatus::Ok);
        assert_eq!(sector.payload, aeslanier_payload(record));
    }
}

#[test]
fn expected_sectors_fill_in_as_missing() {
    init();
    let mut config = test_config();
    config.expected_sectors = Some((0, 8));

    let fluxmap = aeslanier_fluxmap(&[aeslanier_record(0, 3, 0xAA)]);
    let sectors = decode(&fluxmap, &config);

    assert_eq!(sectors.len(), 8);
    let counts = sectors.summary();
    assert_eq!(counts.ok, 1);
    assert_eq!(counts.missing, 7);
}

#[test]
fn decoding_the_same_flux_twice_is_identical() {
    init();
    let records = vec![aeslanier_record(1, 0, 0x55), aeslanier_record(1, 1, 0x99)];
    let fluxmap = aeslanier_fluxmap(&records);
    let config = test_config();

    let first = decode(&fluxmap, &config);
    let second = decode(&fluxmap, &config);

    let collect = |sectors: &TrackSectors| {
        sectors
            .iter()
            .map(|s| (s.logical_sector, s.status, s.payload.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(collect(&first), collect(&second));
}

#[test]
fn cancellation_stops_between_records() {
    init();
    let records: Vec<Vec<u8>> = (0..4).map(|s| aeslanier_record(0, s, 0xAA)).collect();
    let fluxmap = aeslanier_fluxmap(&records);

    let cancel = CancelToken::new();
    cancel.cancel();
    let sectors = decode_track(&fluxmap, TrackLocation::new(0, 0), &test_config(), &cancel);
    assert!(sectors.is_empty());
}
