//! Combining promises.

use crate::catch::{AggregateFault, ErrorValue, OperationCanceled};
use crate::error::PromiseError;
use crate::promise::Promise;
use crate::runtime::Engine;

/// Settles once every member has settled.
///
/// The combined promise:
/// - succeeds with every result, in member order, if all members succeed;
/// - is canceled if any member was canceled;
/// - otherwise faults with an [`AggregateFault`] holding every member fault.
///
/// The members are owned by the combined promise. Canceling it disposes the
/// members that are still pending.
pub fn when_all<T, I>(engine: &Engine, promises: I) -> Promise<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let members: Vec<Promise<T>> = promises.into_iter().collect();
    engine.wrap(async move {
        let mut outcomes = Vec::with_capacity(members.len());
        for member in members {
            outcomes.push(member.await);
        }
        classify(outcomes)
    })
}

/// Classifies member outcomes as [`when_all`] does.
pub fn classify<T>(
    outcomes: Vec<Result<T, PromiseError>>,
) -> Result<Vec<T>, ErrorValue> {
    if outcomes.iter().any(|o| matches!(o, Err(PromiseError::Canceled(_)))) {
        return Err(ErrorValue::new(OperationCanceled));
    }
    let errors: Vec<ErrorValue> = outcomes
        .iter()
        .filter_map(|o| o.as_ref().err().and_then(PromiseError::fault).cloned())
        .collect();
    if !errors.is_empty() {
        return Err(ErrorValue::new(AggregateFault { errors }));
    }
    outcomes
        .into_iter()
        .map(|o| o.map_err(|err| ErrorValue::msg(err.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CancelReason;

    fn faulted(msg: &str) -> Result<u32, PromiseError> {
        Err(PromiseError::Faulted(ErrorValue::msg(msg)))
    }

    #[test]
    fn all_succeed_keeps_order() {
        let outcomes = vec![Ok(1), Ok(2), Ok(3)];
        assert_eq!(classify(outcomes).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn cancellation_wins_over_faults() {
        let outcomes = vec![
            faulted("a"),
            Err(PromiseError::Canceled(CancelReason::default())),
            Ok(3),
        ];
        let err = classify(outcomes).unwrap_err();
        assert!(err.is::<OperationCanceled>());
    }

    #[test]
    fn faults_are_aggregated_in_member_order() {
        let outcomes = vec![faulted("a"), Ok(2), faulted("b")];
        let err = classify(outcomes).unwrap_err();
        let aggregate = err.find::<AggregateFault>().unwrap();
        let messages: Vec<_> = aggregate.errors.iter().map(ToString::to_string).collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[test]
    fn empty_input_succeeds() {
        let outcomes: Vec<Result<u32, PromiseError>> = Vec::new();
        assert!(classify(outcomes).unwrap().is_empty());
    }
}
