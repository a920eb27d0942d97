// SPDX-License-Identifier: AGPL-3.0

#[cfg(test)]
mod tests {
    use soloptic_bytecode::decode_hex_instructions;
    use soloptic_mapper::{
        build_pc_line_map, parse_source_map, EmptyFieldPolicy, JumpType, PcLineMap,
        SourceLineIndex,
    };

    const SOURCE: &str = "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\n\ncontract Vault {\n    uint256 public total;\n\n    function deposit() external payable {\n        total += msg.value;\n    }\n}\n";

    fn offset_of(needle: &str) -> usize {
        SOURCE.find(needle).unwrap()
    }

    #[test]
    fn test_contract_like_mapping() {
        let contract = offset_of("contract Vault");
        let body = offset_of("total += msg.value");

        // PUSH1 0x80, PUSH1 0x40, MSTORE, CALLVALUE, PUSH1 0x00, SSTORE, STOP
        let bytecode = "0x608060405234600055 00".replace(' ', "");
        let source_map = format!(
            "{c}:120:0:-:0;;;{b}:18:0:-:0;;;-1:0:0:-:0",
            c = contract,
            b = body
        );

        let map =
            build_pc_line_map(Some(&source_map), Some(&bytecode), SOURCE, EmptyFieldPolicy::Absent)
                .unwrap();

        assert_eq!(map.len(), 7);
        assert_eq!(map.line_for(0), 4);
        assert_eq!(map.line_for(2), -1);
        assert_eq!(map.line_for(5), 8);
        assert_eq!(map.line_for(9), -1);
        assert_eq!(map.mapped_count(), 2);

        let inherited = build_pc_line_map(
            Some(&source_map),
            Some(&bytecode),
            SOURCE,
            EmptyFieldPolicy::InheritPrevious,
        )
        .unwrap();
        assert_eq!(inherited.line_for(2), 4);
        assert_eq!(inherited.line_for(4), 4);
        assert_eq!(inherited.line_for(6), 8);
        assert_eq!(inherited.mapped_count(), 6);
    }

    #[test]
    fn test_records_align_with_instructions_not_bytes() {
        // PUSH32 <32 bytes>, STOP: two instructions, 34 bytes
        let bytecode = format!("7f{}00", "11".repeat(32));
        let instructions = decode_hex_instructions(&bytecode).unwrap();
        assert_eq!(instructions.len(), 2);

        let records = parse_source_map("0:1:0:i;2:1:0:o", EmptyFieldPolicy::Absent).unwrap();
        assert_eq!(records[0].jump, Some(JumpType::Into));

        let map = PcLineMap::from_parts(&instructions, &records, &SourceLineIndex::new("a\nb\n"));
        assert_eq!(map.line_for(0), 1);
        assert_eq!(map.line_for(33), 2);
    }

    #[test]
    fn test_offset_lookups_over_source() {
        let index = SourceLineIndex::new(SOURCE);
        assert_eq!(index.line_at(0), 1);
        assert_eq!(index.line_at(offset_of("pragma")), 2);
        assert_eq!(index.line_at(offset_of("function deposit")), 7);
        assert_eq!(index.line_count(), SOURCE.split('\n').count());
    }
}
