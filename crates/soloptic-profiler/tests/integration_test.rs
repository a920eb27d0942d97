// SPDX-License-Identifier: AGPL-3.0

#[cfg(test)]
mod tests {
    use serde_json::json;
    use soloptic_mapper::{build_pc_line_map, EmptyFieldPolicy, PcLineMap};
    use soloptic_profiler::{profile_trace, profile_trace_json};
    use soloptic_traces::{ExecutionTrace, TraceStep};

    // PUSH1 0x01, PUSH1 0x02, ADD
    fn three_instruction_map(source_map: &str, source: &str) -> PcLineMap {
        build_pc_line_map(
            Some(source_map),
            Some("6001600201"),
            source,
            EmptyFieldPolicy::Absent,
        )
        .unwrap()
    }

    #[test]
    fn test_lines_one_one_two() {
        let map = three_instruction_map("0:1:0;0:1:0;2:1:0", "A\nB\nC\n");
        let trace = ExecutionTrace::new(vec![
            TraceStep::new(0, "PUSH1", 10, 1),
            TraceStep::new(2, "PUSH1", 20, 1),
            TraceStep::new(4, "ADD", 5, 1),
        ]);

        let profile = profile_trace(&trace, &map);
        assert_eq!(profile.total_cost, 35);
        assert_eq!(profile.cost_by_line.len(), 2);
        assert_eq!(profile.cost_of_line(1), 30);
        assert_eq!(profile.cost_of_line(2), 5);
        assert_eq!(profile.top_lines[0].line, 1);
        assert_eq!(profile.mapped_steps, 3);
    }

    #[test]
    fn test_all_steps_on_one_line() {
        let source = "a\nb\nc\nd\nline five\n";
        let offset = source.find("line five").unwrap();
        let map = three_instruction_map(
            &format!("{o}:4:0;{o}:4:0;{o}:4:0", o = offset),
            source,
        );

        let steps: Vec<TraceStep> = (0..9)
            .map(|i| TraceStep::new([0, 2, 4][i % 3], "X", i as u64 + 1, 1))
            .collect();
        let expected: u64 = steps.iter().map(|s| s.gas_cost).sum();

        let profile = profile_trace(&ExecutionTrace::new(steps), &map);
        assert_eq!(profile.cost_by_line.keys().copied().collect::<Vec<_>>(), vec![5]);
        assert_eq!(profile.cost_of_line(5), expected);
    }

    #[test]
    fn test_mapped_cost_bounded_by_total() {
        let map = three_instruction_map("0:1:0;;", "A\nB\n");
        let trace = json!({
            "gas": 100,
            "failed": false,
            "returnValue": "",
            "structLogs": [
                {"pc": 0, "op": "PUSH1", "gasCost": 3, "depth": 1},
                {"pc": 2, "op": "PUSH1", "gasCost": 3, "depth": 1},
                {"pc": 4, "op": "ADD", "gasCost": 3, "depth": 1},
                {"pc": 99, "gasCost": 40, "depth": 2}
            ]
        });

        let profile = profile_trace_json(&trace, &map).unwrap();
        assert_eq!(profile.total_cost, 49);
        assert_eq!(profile.mapped_cost(), 3);
        assert!(profile.mapped_cost() <= profile.total_cost);
        assert_eq!(profile.opcode_counts["UNKNOWN"], 1);
        assert_eq!(profile.opcode_counts["PUSH1"], 2);
        assert_eq!(profile.unmapped_steps, 3);
    }
}
