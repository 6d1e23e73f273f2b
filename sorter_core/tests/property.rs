use proptest::prelude::*;
use sorter_core::mocks::RecordingTransport;
use sorter_core::{
    ActuatorGateway, ActuatorTable, Direction, FlipperPos, HeightBuffer, HeightCfg, MatchMode,
    Rejection, match_object,
};
use sorter_traits::{DetectedObject, Shape, TargetSpec, TargetStatus};

fn within(v: f32, r: f32, tol: f32) -> bool {
    v >= r * (1.0 - tol) && v <= r * (1.0 + tol)
}

fn shape() -> impl Strategy<Value = Shape> {
    prop_oneof![Just(Shape::Box), Just(Shape::Cylinder)]
}

fn target() -> impl Strategy<Value = TargetSpec> {
    (10.0f32..800.0, 10.0f32..800.0, 10.0f32..400.0, shape(), any::<bool>()).prop_map(
        |(l, w, h, shape, pending)| TargetSpec {
            common_id: format!("{l:.0}x{w:.0}x{h:.0}"),
            length_mm: l,
            width_mm: w,
            height_mm: h,
            shape,
            status: if pending {
                TargetStatus::Pending
            } else {
                TargetStatus::Processed
            },
        },
    )
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Flipper(FlipperPos),
    Push,
    Retract,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Flipper(FlipperPos::Clear)),
        Just(Op::Flipper(FlipperPos::Enter)),
        Just(Op::Flipper(FlipperPos::Exit)),
        Just(Op::Push),
        Just(Op::Retract),
    ]
}

proptest! {
    #[test]
    fn height_average_stays_within_admitted_samples(raws in proptest::collection::vec(-100i32..400, 1..60)) {
        let cfg = HeightCfg::default();
        let mut hb = HeightBuffer::new(cfg.clone());
        for raw in raws {
            let avg = hb.update(raw);
            let samples: Vec<f32> = hb.samples().collect();
            prop_assert!(samples.len() <= cfg.window);
            prop_assert!(samples.iter().all(|s| *s >= 0.0 && *s <= cfg.max_valid_mm));
            if let Some(avg) = avg {
                let lo = samples.iter().copied().fold(f32::INFINITY, f32::min);
                let hi = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                // Average is rounded to 0.1 mm.
                prop_assert!(avg >= lo - 0.05 && avg <= hi + 0.05, "avg {avg} outside [{lo}, {hi}]");
            } else {
                prop_assert!(samples.is_empty());
            }
        }
    }

    #[test]
    fn footprint_match_only_returns_qualifying_targets(
        targets in proptest::collection::vec(target(), 0..12),
        l in 10.0f32..800.0,
        w in 10.0f32..800.0,
        h in 0.0f32..400.0,
        s in shape(),
        tol in 0.0f32..0.3,
    ) {
        let targets: Vec<TargetSpec> = targets
            .into_iter()
            .enumerate()
            .map(|(i, t)| TargetSpec { common_id: format!("t{i}"), ..t })
            .collect();
        let measured = DetectedObject { length_mm: l, width_mm: w, height_mm: h, shape: s, ..Default::default() };
        let r = match_object(&measured, &targets, tol, MatchMode::Footprint);
        if r.found() {
            let t = targets.iter().find(|t| t.common_id == r.target_id).unwrap();
            prop_assert_eq!(t.status, TargetStatus::Pending);
            prop_assert_eq!(t.shape, s);
            let straight = within(l, t.length_mm, tol) && within(w, t.width_mm, tol);
            let turned = within(w, t.length_mm, tol) && within(l, t.width_mm, tol);
            prop_assert!(straight || turned);
            prop_assert!(r.deviation_mm >= 0.0);
        } else {
            prop_assert!(r.target_id.is_empty());
        }
    }

    #[test]
    fn exact_pending_target_is_always_found(t in target(), tol in 0.0f32..0.3) {
        let t = TargetSpec { status: TargetStatus::Pending, ..t };
        let measured = DetectedObject {
            length_mm: t.width_mm,
            width_mm: t.length_mm,
            height_mm: t.height_mm,
            shape: t.shape,
            ..Default::default()
        };
        for mode in [MatchMode::Footprint, MatchMode::SortedDimensions] {
            let r = match_object(&measured, std::slice::from_ref(&t), tol, mode);
            prop_assert!(r.found());
            prop_assert!(r.deviation_mm.abs() < 1e-3);
        }
    }

    #[test]
    fn pusher2_forward_only_when_flipper2_is_clear(ops in proptest::collection::vec(op(), 1..40)) {
        let wire = RecordingTransport::new();
        let mut gw = ActuatorGateway::new(wire.clone(), ActuatorTable::stock(60.0, 30.0), 300.0);
        let mut flipper: Option<FlipperPos> = None;
        for op in ops {
            let before = wire.sent().len();
            match op {
                Op::Flipper(pos) => {
                    gw.move_flipper(2, pos).unwrap();
                    flipper = Some(pos);
                }
                Op::Push => {
                    let res = gw.move_pusher(2, Direction::Fwd, Some(10.0));
                    if flipper == Some(FlipperPos::Clear) {
                        prop_assert!(res.is_ok());
                    } else {
                        let is_interlock = matches!(res, Err(Rejection::Interlock { .. }));
                        prop_assert!(is_interlock);
                        prop_assert_eq!(wire.sent().len(), before);
                    }
                }
                Op::Retract => {
                    // Retracting is always allowed.
                    prop_assert!(gw.move_pusher(2, Direction::Rev, None).is_ok());
                }
            }
        }
    }
}
