//! Integration tests for parameter blocks

use firebird_wire::clumplet::{BlockKind, Clumplet, ParameterBlock};
use firebird_wire::constants::{bpb, dpb};
use firebird_wire::{BlobParameters, Config, TransactionParameters};

mod roundtrip_tests {
    use super::*;

    fn sample(kind: BlockKind) -> ParameterBlock {
        ParameterBlock::new(kind)
            .with(Clumplet::string(dpb::USER_NAME, "SYSDBA"))
            .with(Clumplet::flag(7))
            .with(Clumplet::int(dpb::SQL_DIALECT, 3))
            .with(Clumplet::bytes(99, vec![0u8, 255, 1]))
            .with(Clumplet::string(dpb::USER_NAME, "again"))
    }

    #[test]
    fn test_tagged_roundtrip_keeps_order() {
        let block = sample(BlockKind::Tagged);
        let bytes = block.to_bytes().unwrap();
        let parsed = ParameterBlock::parse(BlockKind::Tagged, &bytes).unwrap();
        assert_eq!(parsed, block);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);

        let tags: Vec<u8> = parsed.iter().map(|c| c.tag()).collect();
        assert_eq!(tags, vec![dpb::USER_NAME, 7, dpb::SQL_DIALECT, 99, dpb::USER_NAME]);
    }

    #[test]
    fn test_wide_roundtrip() {
        let block = sample(BlockKind::Wide).with(Clumplet::bytes(1, vec![b'x'; 1000]));
        let bytes = block.to_bytes().unwrap();
        let parsed = ParameterBlock::parse(BlockKind::Wide, &bytes).unwrap();
        assert_eq!(parsed, block);
        assert_eq!(parsed.get(1).unwrap().content().len(), 1000);
    }

    #[test]
    fn test_empty_block() {
        let block = ParameterBlock::new(BlockKind::Tagged);
        let bytes = block.to_bytes().unwrap();
        assert!(bytes.is_empty());
        assert!(ParameterBlock::parse(BlockKind::Tagged, &bytes).unwrap().is_empty());
    }
}

mod block_builder_tests {
    use super::*;

    #[test]
    fn test_database_parameters_carry_dialect() {
        let config = Config::new("h", "db", "", "").dialect(1);
        let block = config.database_parameters();
        assert!(!block.contains(dpb::USER_NAME));
        assert!(!block.contains(dpb::PASSWORD));
        assert_eq!(block.get(dpb::SQL_DIALECT).and_then(|c| c.as_int()), Some(1));
    }

    #[test]
    fn test_blob_parameters_are_tagged() {
        let params = BlobParameters::new().source_type(1);
        let parsed = ParameterBlock::parse(BlockKind::Tagged, &params.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.get(bpb::SOURCE_TYPE).and_then(|c| c.as_int()), Some(1));
        assert!(!parsed.contains(bpb::TYPE));
    }

    #[test]
    fn test_transaction_parameter_order() {
        let params = TransactionParameters::new().with(8).with(2).with(7);
        assert_eq!(params.to_vec(), vec![8, 2, 7]);
    }
}
