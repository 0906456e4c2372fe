//! Snapshot semantics across every core: tagged records, architecture
//! checking on restore, and resume that is indistinguishable from an
//! uninterrupted run.

mod common;

use common::all_machines;
use core_lib::SnapshotError;
use pretty_assertions::assert_eq;

#[test]
fn snapshots_carry_the_architecture_tag() {
    for mut m in all_machines() {
        for _ in 0..5 {
            m.cpu.step(&mut m.mem);
        }
        let snap = m.cpu.snapshot().unwrap();
        assert_eq!(snap["cpu"], m.cpu.id(), "{}", m.name);
    }
}

#[test]
fn restore_rejects_every_foreign_architecture() {
    let snaps: Vec<(String, serde_json::Value)> = all_machines()
        .iter()
        .map(|m| (m.cpu.id().to_owned(), m.cpu.snapshot().unwrap()))
        .collect();

    for mut m in all_machines() {
        for (from, snap) in &snaps {
            if *from == m.cpu.id() {
                continue;
            }
            match m.cpu.restore(snap) {
                Err(SnapshotError::ArchitectureMismatch { expected, found }) => {
                    assert_eq!(expected, m.cpu.id());
                    assert_eq!(&found, from);
                }
                other => panic!(
                    "restoring a '{from}' snapshot into '{}' gave {other:?}",
                    m.cpu.id()
                ),
            }
        }
    }
}

#[test]
fn restore_accepts_its_own_architecture() {
    for mut m in all_machines() {
        for _ in 0..7 {
            m.cpu.step(&mut m.mem);
        }
        let snap = m.cpu.snapshot().unwrap();
        // Keep running, then rewind.
        for _ in 0..5 {
            m.cpu.step(&mut m.mem);
        }
        m.cpu.restore(&snap).unwrap();
        assert_eq!(m.cpu.snapshot().unwrap(), snap, "{}", m.name);
    }
}

#[test]
fn resume_matches_an_uninterrupted_run() {
    for (mut live, mut resumed) in all_machines().into_iter().zip(all_machines()) {
        for _ in 0..4 {
            live.cpu.step(&mut live.mem);
        }
        let snap = live.cpu.snapshot().unwrap();
        // Hand the whole machine over: CPU record plus the memory image.
        resumed.mem.load(0, live.mem.as_slice());
        resumed.cpu.restore(&snap).unwrap();

        for _ in 0..8 {
            live.cpu.step(&mut live.mem);
            resumed.cpu.step(&mut resumed.mem);
        }
        assert_eq!(
            live.cpu.snapshot().unwrap(),
            resumed.cpu.snapshot().unwrap(),
            "{} resume diverged",
            live.name
        );
    }
}

#[test]
fn snapshots_survive_a_text_round_trip() {
    for mut m in all_machines() {
        for _ in 0..3 {
            m.cpu.step(&mut m.mem);
        }
        let snap = m.cpu.snapshot().unwrap();
        let text = serde_json::to_string_pretty(&snap).unwrap();
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        m.cpu.restore(&back).unwrap();
        assert_eq!(m.cpu.snapshot().unwrap(), snap, "{}", m.name);
    }
}
