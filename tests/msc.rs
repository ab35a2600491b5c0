//! Bulk-Only mass storage behavior over the emulated SIE

mod common;

use common::{Host, HostError};
use kinetis_usbd::class::msc::storage::{RamDisk, RamFatDisk, Storage};
use kinetis_usbd::class::msc::{self, Msc};
use usb_device::UsbDirection;

const EP: usize = msc::BULK_EP;

const CBW_SIGNATURE: [u8; 4] = 0x43425355u32.to_le_bytes();
const CSW_SIGNATURE: [u8; 4] = 0x53425355u32.to_le_bytes();

#[derive(Debug, PartialEq, Eq)]
struct Csw {
    tag: u32,
    residue: u32,
    status: u8,
}

fn fat_host() -> Host<Msc<RamFatDisk>> {
    let mut host = Host::new(Msc::new(RamFatDisk::new()), &msc::DESCRIPTORS);
    host.enumerate(5);
    host
}

fn ram_host() -> Host<Msc<RamDisk<8192>>> {
    let mut host = Host::new(Msc::new(RamDisk::new()), &msc::DESCRIPTORS);
    host.enumerate(5);
    host
}

/// Run the deferred main-loop work
fn service<S: Storage>(host: &mut Host<Msc<S>>) {
    let (driver, function) = host.dev.split_mut();
    function.service(driver);
}

fn send_cbw<S: Storage>(
    host: &mut Host<Msc<S>>,
    tag: u32,
    data_len: u32,
    host_in: bool,
    cb: &[u8],
) {
    let mut bytes = [0u8; 31];
    bytes[..4].copy_from_slice(&CBW_SIGNATURE);
    bytes[4..8].copy_from_slice(&tag.to_le_bytes());
    bytes[8..12].copy_from_slice(&data_len.to_le_bytes());
    bytes[12] = if host_in { 0x80 } else { 0x00 };
    bytes[14] = cb.len() as u8;
    bytes[15..15 + cb.len()].copy_from_slice(cb);

    host.submit_out(EP, false, &bytes).expect("CBW accepted");
    service(host);
}

/// Collect an IN data stage of `total` bytes, one packet at a time
fn read_data<S: Storage>(host: &mut Host<Msc<S>>, total: usize) -> Vec<u8> {
    let mut data = Vec::new();
    while data.len() < total {
        let packet = host.take_in(EP).expect("data packet");
        assert!(!packet.is_empty());
        data.extend_from_slice(&packet);
        service(host);
    }
    data
}

fn read_csw<S: Storage>(host: &mut Host<Msc<S>>) -> Csw {
    let bytes = host.take_in(EP).expect("CSW");
    service(host);
    assert_eq!(bytes.len(), 13);
    assert_eq!(&bytes[..4], &CSW_SIGNATURE);
    Csw {
        tag: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
        residue: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        status: bytes[12],
    }
}

/// Host expects `Err(Stall)`, then clears the halt
fn expect_stalled_in<S: Storage>(host: &mut Host<Msc<S>>) {
    assert_eq!(host.take_in(EP), Err(HostError::Stall));
    host.clear_endpoint_halt(EP, UsbDirection::In).unwrap();
    service(host);
}

#[test]
fn inquiry_round_trip() {
    let mut host = fat_host();
    let cb = [0x12, 0x00, 0x00, 0x00, 0x24, 0x00];
    send_cbw(&mut host, 0x1001, 36, true, &cb);

    let data = read_data(&mut host, 36);
    assert_eq!(data.len(), 36);
    assert_eq!(data[0], 0x00); // direct access device
    assert_eq!(data[1], 0x80); // removable
    assert_eq!(data[4], 0x20); // additional length
    assert_eq!(&data[8..16], b"KINETIS ");

    let csw = read_csw(&mut host);
    assert_eq!(
        csw,
        Csw {
            tag: 0x1001,
            residue: 0,
            status: 0
        }
    );
}

#[test]
fn read10_streams_two_blocks() {
    let mut host = fat_host();
    // READ(10), LBA 0, 2 blocks
    let cb = [0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00];
    send_cbw(&mut host, 0x2002, 1024, true, &cb);

    let data = read_data(&mut host, 1024);
    assert_eq!(data.len(), 1024);

    // The stream is the volume's first two sectors
    let mut expected = vec![0u8; 1024];
    let mut disk = RamFatDisk::new();
    disk.read_chunk(0, 0, &mut expected[..512]).unwrap();
    disk.read_chunk(1, 0, &mut expected[512..]).unwrap();
    assert_eq!(data, expected);
    assert_eq!(data[510], 0x55);
    assert_eq!(data[511], 0xAA);

    let csw = read_csw(&mut host);
    assert_eq!(
        csw,
        Csw {
            tag: 0x2002,
            residue: 0,
            status: 0
        }
    );
}

#[test]
fn read10_of_zero_blocks_is_a_no_data_success() {
    let mut host = fat_host();
    let cb = [0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x2003, 0, false, &cb);

    let csw = read_csw(&mut host);
    assert_eq!(
        csw,
        Csw {
            tag: 0x2003,
            residue: 0,
            status: 0
        }
    );
}

#[test]
fn read10_past_the_last_block_fails_with_sense() {
    let mut host = fat_host();
    // Capacity is 64 blocks; LBA 63 + 2 runs off the end
    let cb = [0x28, 0x00, 0x00, 0x00, 0x00, 0x3F, 0x00, 0x00, 0x02, 0x00];
    send_cbw(&mut host, 0x2004, 1024, true, &cb);

    expect_stalled_in(&mut host);
    let csw = read_csw(&mut host);
    assert_eq!(
        csw,
        Csw {
            tag: 0x2004,
            residue: 1024,
            status: 1
        }
    );

    // REQUEST_SENSE reports ILLEGAL REQUEST / LBA OUT OF RANGE
    let cb = [0x03, 0x00, 0x00, 0x00, 18, 0x00];
    send_cbw(&mut host, 0x2005, 18, true, &cb);
    let sense = read_data(&mut host, 18);
    assert_eq!(sense[0], 0x70);
    assert_eq!(sense[2], 0x05);
    assert_eq!(sense[12], 0x21);
    assert_eq!(read_csw(&mut host).status, 0);

    // The sense was consumed
    let cb = [0x03, 0x00, 0x00, 0x00, 18, 0x00];
    send_cbw(&mut host, 0x2006, 18, true, &cb);
    let sense = read_data(&mut host, 18);
    assert_eq!(sense[2], 0x00);
    assert_eq!(read_csw(&mut host).status, 0);
}

#[test]
fn write10_to_protected_media_fails_with_data_protect() {
    let mut host = fat_host();
    let cb = [0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
    send_cbw(&mut host, 0x3001, 512, false, &cb);

    // Bulk OUT is stalled; the CSW is still readable on IN
    let csw = read_csw(&mut host);
    assert_eq!(
        csw,
        Csw {
            tag: 0x3001,
            residue: 512,
            status: 1
        }
    );
    assert_eq!(
        host.submit_out(EP, false, &[0u8; 64]),
        Err(HostError::Stall)
    );
    host.clear_endpoint_halt(EP, UsbDirection::Out).unwrap();
    service(&mut host);

    // Sense explains, then TEST UNIT READY passes again
    let cb = [0x03, 0x00, 0x00, 0x00, 18, 0x00];
    send_cbw(&mut host, 0x3002, 18, true, &cb);
    let sense = read_data(&mut host, 18);
    assert_eq!(sense[2], 0x07);
    assert_eq!(sense[12], 0x27);
    assert_eq!(read_csw(&mut host).status, 0);

    let cb = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x3003, 0, false, &cb);
    assert_eq!(read_csw(&mut host).status, 0);
}

#[test]
fn write10_round_trips_through_the_backend() {
    let mut host = ram_host();
    let payload: Vec<u8> = (0..512u32).map(|i| i as u8).collect();

    let cb = [0x2A, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x01, 0x00];
    send_cbw(&mut host, 0x4001, 512, false, &cb);
    for chunk in payload.chunks(64) {
        host.submit_out(EP, false, chunk).unwrap();
        service(&mut host);
    }

    let csw = read_csw(&mut host);
    assert_eq!(
        csw,
        Csw {
            tag: 0x4001,
            residue: 0,
            status: 0
        }
    );

    let (_, function) = host.dev.split_mut();
    let mut readback = [0u8; 512];
    function.storage_mut().read_chunk(3, 0, &mut readback).unwrap();
    assert_eq!(readback.as_slice(), payload.as_slice());

    // And READ(10) streams the same bytes back over the wire
    let cb = [0x28, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x01, 0x00];
    send_cbw(&mut host, 0x4002, 512, true, &cb);
    let data = read_data(&mut host, 512);
    assert_eq!(data.as_slice(), payload.as_slice());
    assert_eq!(read_csw(&mut host).residue, 0);
}

#[test]
fn read_capacity_and_mode_sense() {
    let mut host = fat_host();

    let cb = [0x25, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x5001, 8, true, &cb);
    let data = read_data(&mut host, 8);
    assert_eq!(&data[..4], &63u32.to_be_bytes());
    assert_eq!(&data[4..], &512u32.to_be_bytes());
    assert_eq!(read_csw(&mut host).status, 0);

    let cb = [0x1A, 0x00, 0x00, 0x00, 0x04, 0x00];
    send_cbw(&mut host, 0x5002, 4, true, &cb);
    let data = read_data(&mut host, 4);
    // Write-protected volume flags the device-specific bit
    assert_eq!(data, [0x03, 0x00, 0x80, 0x00]);
    assert_eq!(read_csw(&mut host).status, 0);
}

#[test]
fn get_max_lun_is_zero() {
    let mut host = fat_host();
    let lun = host
        .control_read([0xA1, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00])
        .unwrap();
    assert_eq!(lun, [0x00]);
}

#[test]
fn unknown_opcode_fails_with_illegal_request() {
    let mut host = fat_host();
    let cb = [0xA5, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x6001, 0, false, &cb);

    let csw = read_csw(&mut host);
    assert_eq!(csw.status, 1);

    let cb = [0x03, 0x00, 0x00, 0x00, 18, 0x00];
    send_cbw(&mut host, 0x6002, 18, true, &cb);
    let sense = read_data(&mut host, 18);
    assert_eq!(sense[2], 0x05);
    assert_eq!(sense[12], 0x20);
    assert_eq!(read_csw(&mut host).status, 0);
}

/* The thirteen-case corners not covered above */

#[test]
fn case_4_host_reads_data_the_device_does_not_have() {
    let mut host = fat_host();
    // TEST UNIT READY with a 36-byte IN expectation
    let cb = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x7004, 36, true, &cb);

    let data = read_data(&mut host, 36);
    assert_eq!(data, vec![0u8; 36]);
    let csw = read_csw(&mut host);
    assert_eq!(csw.residue, 36);
    assert_eq!(csw.status, 0);
}

#[test]
fn case_5_device_sends_less_than_the_host_expects() {
    let mut host = fat_host();
    let cb = [0x12, 0x00, 0x00, 0x00, 0x24, 0x00];
    send_cbw(&mut host, 0x7005, 64, true, &cb);

    let data = read_data(&mut host, 36);
    assert_eq!(data.len(), 36);
    expect_stalled_in(&mut host);

    let csw = read_csw(&mut host);
    assert_eq!(csw.residue, 28);
    assert_eq!(csw.status, 0);
}

#[test]
fn case_7_device_truncates_to_the_host_length() {
    let mut host = fat_host();
    // Two blocks on the media, but the host only budgets one
    let cb = [0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00];
    send_cbw(&mut host, 0x7007, 512, true, &cb);

    let data = read_data(&mut host, 512);
    assert_eq!(data.len(), 512);
    let csw = read_csw(&mut host);
    assert_eq!(csw.status, 2);
}

#[test]
fn case_8_direction_disagreement_on_an_in_transfer() {
    let mut host = ram_host();
    // WRITE(10) but the host claims an IN data stage
    let cb = [0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
    send_cbw(&mut host, 0x7008, 512, true, &cb);

    let data = read_data(&mut host, 512);
    assert_eq!(data, vec![0u8; 512]);
    let csw = read_csw(&mut host);
    assert_eq!(csw.residue, 512);
    assert_eq!(csw.status, 2);
}

#[test]
fn case_9_host_writes_data_the_device_does_not_want() {
    let mut host = fat_host();
    let cb = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x7009, 31, false, &cb);

    // OUT is stalled; the CSW still reports the command's status
    assert_eq!(host.submit_out(EP, false, &[0u8; 31]), Err(HostError::Stall));
    let csw = read_csw(&mut host);
    assert_eq!(csw.residue, 31);
    assert_eq!(csw.status, 0);

    host.clear_endpoint_halt(EP, UsbDirection::Out).unwrap();
    service(&mut host);
    let cb = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x700A, 0, false, &cb);
    assert_eq!(read_csw(&mut host).status, 0);
}

#[test]
fn case_10_direction_disagreement_on_an_out_transfer() {
    let mut host = fat_host();
    // READ(10) but the host claims an OUT data stage
    let cb = [0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
    send_cbw(&mut host, 0x700B, 512, false, &cb);

    expect_stalled_in(&mut host);
    let csw = read_csw(&mut host);
    assert_eq!(csw.residue, 512);
    assert_eq!(csw.status, 2);
}

#[test]
fn case_11_device_wants_less_than_the_host_sends() {
    let mut host = ram_host();
    // One block of real data in a 1024-byte pipeline
    let cb = [0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
    send_cbw(&mut host, 0x700C, 1024, false, &cb);

    for chunk in vec![0xAAu8; 512].chunks(64) {
        host.submit_out(EP, false, chunk).unwrap();
        service(&mut host);
    }

    // The rest of the host's data meets a stall
    assert_eq!(host.submit_out(EP, false, &[0u8; 64]), Err(HostError::Stall));
    let csw = read_csw(&mut host);
    assert_eq!(csw.residue, 512);
    assert_eq!(csw.status, 0);
}

#[test]
fn case_13_host_sends_less_than_the_device_wants() {
    let mut host = ram_host();
    // Four blocks declared in the command, one block's worth offered
    let cb = [0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00];
    send_cbw(&mut host, 0x700D, 512, false, &cb);

    assert_eq!(host.submit_out(EP, false, &[0u8; 64]), Err(HostError::Stall));
    let csw = read_csw(&mut host);
    assert_eq!(csw.residue, 512);
    assert_eq!(csw.status, 2);
}

#[test]
fn invalid_cbw_wedges_the_transport_until_reset() {
    let mut host = fat_host();

    let mut bad = [0u8; 31];
    bad[..4].copy_from_slice(b"NOPE");
    bad[14] = 6;
    host.submit_out(EP, false, &bad).unwrap();
    service(&mut host);

    // Both directions are stalled, and no CSW was produced
    assert_eq!(host.take_in(EP), Err(HostError::Stall));
    assert_eq!(host.submit_out(EP, false, &[0u8; 31]), Err(HostError::Stall));

    // Clear-Feature alone does not recover: the device re-stalls
    host.clear_endpoint_halt(EP, UsbDirection::In).unwrap();
    service(&mut host);
    assert_eq!(host.take_in(EP), Err(HostError::Stall));

    // Bulk-Only Mass Storage Reset, then the halts clear for real
    host.control_nodata([0x21, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
        .unwrap();
    host.clear_endpoint_halt(EP, UsbDirection::In).unwrap();
    host.clear_endpoint_halt(EP, UsbDirection::Out).unwrap();
    service(&mut host);

    let cb = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x8001, 0, false, &cb);
    assert_eq!(read_csw(&mut host).status, 0);
}

#[test]
fn short_cbw_is_invalid() {
    let mut host = fat_host();
    host.submit_out(EP, false, &[0u8; 10]).unwrap();
    service(&mut host);
    assert_eq!(host.take_in(EP), Err(HostError::Stall));
}

#[test]
fn repeated_reset_is_idempotent() {
    let mut host = fat_host();

    for _ in 0..2 {
        host.control_nodata([0x21, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
            .unwrap();
    }

    let cb = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    send_cbw(&mut host, 0x9001, 0, false, &cb);
    assert_eq!(read_csw(&mut host).status, 0);
}

#[test]
fn csw_tags_echo_every_command() {
    let mut host = fat_host();
    for tag in [1u32, 0xFFFF_FFFF, 0xDEAD_BEEF] {
        let cb = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        send_cbw(&mut host, tag, 0, false, &cb);
        assert_eq!(read_csw(&mut host).tag, tag);
    }
}
