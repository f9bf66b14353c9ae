#[cfg(test)]
mod travel_time_tests {
    use std::sync::Arc;

    use tau_travel_time::arrivals::Request;
    use tau_travel_time::auxdata::AuxData;
    use tau_travel_time::model::RadialModel;
    use tau_travel_time::session::{Session, SessionFlags};
    use tau_travel_time::tables::RefTables;

    fn tables() -> Arc<RefTables> {
        let model = RadialModel::from_file("data/models/ak135.mod").unwrap();
        Arc::new(RefTables::build(model).unwrap())
    }

    fn session(tables: Arc<RefTables>) -> Session {
        let aux = Arc::new(AuxData::load("data/aux").unwrap());
        Session::from_parts("ak135".to_string(), tables, aux)
    }

    fn scenario_flags() -> SessionFlags {
        SessionFlags {
            return_all_phases: true,
            return_back_branches: true,
            tectonic: true,
            use_rstt: false,
            plot_mode: false,
        }
    }

    fn simple(delta: f64) -> Request {
        Request {
            delta_deg: Some(delta),
            ..Default::default()
        }
    }

    #[test]
    fn test_regional_first_arrival() {
        let mut s = session(tables());
        s.new_session(10.0, &[], scenario_flags()).unwrap();
        let tts = s.get_tt(&simple(1.0));
        assert!(!tts.is_empty());

        for a in tts.iter().take(6) {
            println!(
                "{:<8} tt={:8.3} dTdD={:7.3} dTdZ={:7.4} spread={:5.3} observ={:8.1}",
                a.phase_code, a.tt, a.d_tdd, a.d_tdz, a.spread, a.observ
            );
        }
        // Crustal P is first at one degree, around 19-20 s in this model.
        let first = &tts[0];
        assert!(
            first.phase_code == "Pg" || first.phase_code == "Pup",
            "unexpected first arrival {}",
            first.phase_code
        );
        assert!(first.tt > 17.0 && first.tt < 23.0, "tt {}", first.tt);
        assert!(first.d_tdd > 15.0 && first.d_tdd < 22.0);
        assert!(first.regional);
        assert!(first.can_use);
        assert_eq!(first.phase_group, "P");
        assert_eq!(first.aux_group, "PKP");
        assert!(first.window >= 5.0);
        assert!(first.spread > 0.0);
        // Near-grazing crustal rays carry a small depth derivative.
        assert!(first.d_tdz.abs() < 0.25);
    }

    #[test]
    fn test_teleseismic_first_arrival() {
        let mut s = session(tables());
        s.new_session(10.0, &[], scenario_flags()).unwrap();
        let tts = s.get_tt(&simple(90.0));
        assert!(!tts.is_empty());
        let first = &tts[0];
        println!("first at 90 deg: {} tt={:.3}", first.phase_code, first.tt);
        assert_eq!(first.phase_code, "P");
        assert!(first.tt > 700.0 && first.tt < 900.0, "tt {}", first.tt);
        assert!(first.d_tdd > 3.0 && first.d_tdd < 7.0);
        // Deepening the source shortens a down-going teleseismic path.
        assert!(first.d_tdz < 0.0);
        assert!(first.spread > 0.0 && first.window >= 5.0);
        assert_eq!(first.phase_group, "P");
    }

    #[test]
    fn test_antipodal_core_phase() {
        let mut s = session(tables());
        s.new_session(10.0, &[], scenario_flags()).unwrap();
        let tts = s.get_tt(&simple(180.0));
        assert!(!tts.is_empty());
        let first = &tts[0];
        println!("first at 180 deg: {} tt={:.3}", first.phase_code, first.tt);
        assert!(
            first.phase_code.starts_with("PKP"),
            "unexpected {}",
            first.phase_code
        );
        assert!(first.tt > 1100.0 && first.tt < 1350.0, "tt {}", first.tt);
        // The antipodal ray travels nearly vertically.
        assert!(first.d_tdd.abs() < 1.0);
        assert!(first.d_tdz < 0.0);
    }

    #[test]
    fn test_geographic_request_applies_corrections() {
        let t = tables();
        let mut s = session(t.clone());
        s.new_session(0.0, &[], scenario_flags()).unwrap();

        let geo = Request {
            elev_km: 1.2,
            source_lat: Some(50.2075),
            source_lon: Some(-114.8603),
            recv_lat: Some(49.0586),
            recv_lon: Some(-113.9115),
            ..Default::default()
        };
        let geo_tts = s.get_tt(&geo);
        assert!(!geo_tts.is_empty());

        let (delta, _) =
            tau_travel_time::geometry::delaz(50.2075, -114.8603, 49.0586, -113.9115);
        let plain = Request {
            delta_deg: Some(delta),
            elev_km: 1.2,
            ..Default::default()
        };
        let plain_tts = s.get_tt(&plain);
        assert_eq!(geo_tts.len(), plain_tts.len());
        // The ellipticity correction shifts at least the major phases.
        let shifted = geo_tts
            .iter()
            .zip(&plain_tts)
            .any(|(a, b)| a.phase_code == b.phase_code && (a.tt - b.tt).abs() > 1e-6);
        assert!(shifted, "geographic request produced identical times");
    }

    #[test]
    fn test_phase_list_restricts_output() {
        let mut s = session(tables());
        let list = vec!["PKP".to_string(), "SKP".to_string()];
        s.new_session(33.0, &list, scenario_flags()).unwrap();
        // Core phases are sparse at ten degrees; whatever comes back must
        // match the requested prefixes. A far distance must produce some.
        for delta in [10.0, 180.0] {
            let tts = s.get_tt(&simple(delta));
            if delta == 180.0 {
                assert!(!tts.is_empty());
            }
            for a in &tts {
                let code = a.phase_code.as_str();
                let stripped = code
                    .strip_prefix('p')
                    .or_else(|| code.strip_prefix('s'))
                    .unwrap_or(code);
                assert!(
                    stripped.starts_with("PKP") || stripped.starts_with("SKP"),
                    "unexpected phase {}",
                    code
                );
            }
        }
    }

    #[test]
    fn test_ordering_and_filter_laws() {
        let t = tables();
        let mut s = session(t.clone());
        s.new_session(10.0, &[], scenario_flags()).unwrap();
        for delta in [1.0, 25.0, 60.0, 120.0, 180.0] {
            let tts = s.get_tt(&simple(delta));
            for w in tts.windows(2) {
                assert!(w[0].tt <= w[1].tt, "ordering violated at {} deg", delta);
                if w[0].phase_code == w[1].phase_code {
                    assert!(
                        w[1].tt - w[0].tt > 0.005,
                        "chatter at {} deg: {}",
                        delta,
                        w[0].phase_code
                    );
                }
            }
            // Tectonic mode leaves no Pb/Sb codes behind.
            for a in &tts {
                assert!(!a.phase_code.contains("Pb"), "{}", a.phase_code);
                assert!(!a.phase_code.contains("Sb"), "{}", a.phase_code);
            }
        }
    }

    #[test]
    fn test_no_back_branches_mode() {
        let mut s = session(tables());
        let mut flags = scenario_flags();
        flags.return_back_branches = false;
        s.new_session(10.0, &[], flags).unwrap();
        for delta in [30.0, 150.0] {
            let tts = s.get_tt(&simple(delta));
            let mut seen = std::collections::HashSet::new();
            for a in &tts {
                assert!(
                    seen.insert(a.phase_code.clone()),
                    "repeated phase {} at {} deg",
                    a.phase_code,
                    delta
                );
            }
        }
    }

    #[test]
    fn test_spline_consistency_on_reference_branches() {
        let t = tables();
        for b in &t.branches {
            for k in 0..b.p.len() {
                let (tau, x, _) = b.basis.evaluate(b.p[k]).unwrap();
                assert!((tau - b.tau[k]).abs() < 1e-6, "{} tau", b.phase_code);
                assert!((x - b.x[k]).abs() < 1e-6, "{} x", b.phase_code);
            }
        }
    }

    #[test]
    fn test_depth_round_trip_determinism() {
        let t = tables();
        let mut s = session(t.clone());
        s.new_session(120.0, &[], scenario_flags()).unwrap();
        let a = s.get_tt(&simple(45.0));
        s.new_session(350.0, &[], scenario_flags()).unwrap();
        s.new_session(120.0, &[], scenario_flags()).unwrap();
        let b = s.get_tt(&simple(45.0));
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.phase_code, y.phase_code);
            assert_eq!(x.tt.to_bits(), y.tt.to_bits());
        }
    }

    #[test]
    fn test_deeper_source_earlier_teleseism() {
        let t = tables();
        let mut s = session(t.clone());
        s.new_session(10.0, &[], scenario_flags()).unwrap();
        let shallow = s.get_tt(&simple(60.0));
        s.new_session(600.0, &[], scenario_flags()).unwrap();
        let deep = s.get_tt(&simple(60.0));
        let p_shallow = shallow.iter().find(|a| a.phase_code == "P").unwrap();
        let p_deep = deep.iter().find(|a| a.phase_code == "P").unwrap();
        println!("P at 60 deg: 10 km {:.2} s, 600 km {:.2} s", p_shallow.tt, p_deep.tt);
        assert!(p_deep.tt < p_shallow.tt);
        // No crustal phases from a 600 km source.
        assert!(deep.iter().all(|a| a.phase_code != "Pg" && a.phase_code != "Sg"));
        // Depth phases exist only for the buried source and trail the direct.
        let pp_deep = deep.iter().find(|a| a.phase_code == "pP").unwrap();
        assert!(pp_deep.tt > p_deep.tt);
    }

    #[test]
    fn test_shared_tables_across_threads() {
        let t = tables();
        let mut handles = Vec::new();
        for depth in [10.0, 100.0, 300.0] {
            let t = t.clone();
            handles.push(std::thread::spawn(move || {
                let mut s = session(t);
                s.new_session(depth, &[], scenario_flags()).unwrap();
                let tts = s.get_tt(&simple(50.0));
                assert!(!tts.is_empty());
                tts[0].tt
            }));
        }
        for h in handles {
            let tt = h.join().unwrap();
            assert!(tt > 0.0);
        }
    }
}
