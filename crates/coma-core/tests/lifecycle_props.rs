use chrono::Utc;
use coma_core::lifecycle::{self, allowed_transitions, effective_status, validate_transition};
use coma_core::{DocumentHeader, DocumentRecord, DocumentStatus, DocumentType};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Advance(DocumentStatus),
    Finish(DocumentStatus),
    Pause,
    Unpause,
    Revert,
}

fn status() -> impl Strategy<Value = DocumentStatus> {
    proptest::sample::select(DocumentStatus::ALL.to_vec())
}

fn processing() -> impl Strategy<Value = DocumentStatus> {
    proptest::sample::select(vec![DocumentStatus::Ingesting, DocumentStatus::Analyzing])
}

fn header(status: DocumentStatus) -> DocumentHeader {
    DocumentRecord::new("a.pdf", DocumentType::Master, Utc::now())
        .with_status(status)
        .header
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => status().prop_map(Op::Advance),
        1 => status().prop_map(Op::Finish),
        1 => Just(Op::Pause),
        1 => Just(Op::Unpause),
        1 => Just(Op::Revert),
    ]
}

proptest! {
    #[test]
    fn prop_validate_matches_table(
        from in status().prop_filter("paused depends on memory", |s| *s != DocumentStatus::Paused),
        to in status(),
    ) {
        prop_assert_eq!(
            validate_transition(&header(from), to).is_ok(),
            allowed_transitions(from).contains(&to)
        );
    }

    #[test]
    fn prop_paused_exits_only_to_remembered(before in processing(), to in status()) {
        let mut paused = header(before);
        lifecycle::pause(&mut paused).unwrap();

        prop_assert_eq!(validate_transition(&paused, to).is_ok(), to == before);
        prop_assert!(lifecycle::ensure_not_paused(&paused).is_err());

        let mut finished = paused.clone();
        match lifecycle::finish(&mut finished, to) {
            Ok(()) => {
                prop_assert!(allowed_transitions(before).contains(&to));
                prop_assert_eq!(finished.status, to);
                prop_assert_eq!(finished.status_before_pause, None);
            }
            Err(_) => prop_assert_eq!(&finished, &paused),
        }
    }

    #[test]
    fn prop_pause_memory_consistent(ops in proptest::collection::vec(op(), 0..40)) {
        let mut header = header(DocumentStatus::Uploaded);

        for op in ops {
            let before = header.clone();
            let applied = match op {
                Op::Advance(to) => lifecycle::advance(&mut header, to).is_ok(),
                Op::Finish(to) => lifecycle::finish(&mut header, to).is_ok(),
                Op::Pause => lifecycle::pause(&mut header).is_ok(),
                Op::Unpause => lifecycle::unpause(&mut header).is_ok(),
                Op::Revert => {
                    let status = lifecycle::revert(&mut header);
                    prop_assert!(!status.is_processing());
                    prop_assert_ne!(status, DocumentStatus::Paused);
                    true
                }
            };
            if !applied {
                // rejected operations leave the header untouched
                prop_assert_eq!(&header, &before);
            }
            if let (Op::Advance(to), true, Some(remembered)) = (&op, applied, before.status_before_pause) {
                prop_assert_eq!(*to, remembered);
            }

            prop_assert_eq!(
                header.status_before_pause.is_some(),
                header.status == DocumentStatus::Paused
            );
            if let Some(remembered) = header.status_before_pause {
                prop_assert!(remembered.is_processing());
            }
            prop_assert_ne!(effective_status(&header), DocumentStatus::Paused);
        }
    }
}

#[test]
fn transitions_outside_table_rejected() {
    assert!(validate_transition(&header(DocumentStatus::Uploaded), DocumentStatus::Draft).is_ok());
    assert!(validate_transition(&header(DocumentStatus::Uploaded), DocumentStatus::Annotated).is_err());
    assert!(validate_transition(&header(DocumentStatus::Analyzed), DocumentStatus::Annotated).is_err());
    assert!(validate_transition(&header(DocumentStatus::Ingesting), DocumentStatus::Paused).is_err());
}
