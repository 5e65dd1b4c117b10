//! Selector → key prefix compiler
//!
//! Only a single comparison node is compilable. A `$prefix` comparison
//! yields its operand as the key prefix; any other operator yields an empty
//! prefix, which widens the scan to the whole collection. Combinators are
//! rejected outright.

use crate::observability::{log_event_with_fields, Event};

use super::expr::{Expr, Operator};
use super::format::PrefixFormatter;
use super::SelectorError;

/// Compiles `expr` into the byte prefix bounding the scan.
///
/// An empty result means "scan everything".
pub fn compile(expr: &Expr) -> Result<Vec<u8>, SelectorError> {
    let cmp = match expr {
        Expr::Cmp(cmp) => cmp,
        Expr::And(_) | Expr::Or(_) | Expr::Not(_) => {
            return Err(SelectorError::Unsupported {
                shape: expr.shape(),
            })
        }
    };

    if cmp.op != Operator::Prefix {
        log_event_with_fields(
            Event::SelectorFullScan,
            &[("field", cmp.field.as_str()), ("op", cmp.op.as_str())],
        );
        return Ok(Vec::new());
    }

    let operand = cmp.expand(&PrefixFormatter);
    Ok(operand.trim_matches('"').as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Literal;

    #[test]
    fn test_prefix_compiles_to_operand() {
        assert_eq!(compile(&Expr::prefix("_id", "user:")).unwrap(), b"user:".to_vec());
    }

    #[test]
    fn test_quoted_operand_is_stripped() {
        let expr = Expr::prefix("_id", "\"order:\"");
        assert_eq!(compile(&expr).unwrap(), b"order:".to_vec());
    }

    #[test]
    fn test_other_operator_widens_to_full_scan() {
        let expr = Expr::cmp("_id", Operator::Gte, Literal::from("user:"));
        assert!(compile(&expr).unwrap().is_empty());
    }

    #[test]
    fn test_empty_operand_is_full_scan() {
        assert!(compile(&Expr::prefix("_id", "")).unwrap().is_empty());
    }

    #[test]
    fn test_combinators_rejected_with_shape() {
        let cases = [
            (Expr::and(vec![Expr::prefix("_id", "a")]), "AndExpr"),
            (Expr::or(vec![Expr::prefix("_id", "a")]), "OrExpr"),
            (Expr::not(Expr::prefix("_id", "a")), "NotExpr"),
        ];

        for (expr, shape) in cases {
            match compile(&expr) {
                Err(SelectorError::Unsupported { shape: got }) => assert_eq!(got, shape),
                other => panic!("expected unsupported selector, got {:?}", other),
            }
        }
    }
}
