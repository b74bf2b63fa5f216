// src/validation.rs - Error-accumulating validation results
//
// Sibling fields of a configuration object are checked independently, and a
// rejected document should report every problem in one pass. A plain
// `Result` short-circuits on the first error, so validation uses this small
// combinator type instead: combining two results concatenates their error
// sequences rather than dropping one of them.

/// A computation that is either valid or carries one or more errors.
///
/// The error vector of the `Invalid` variant is never empty; construct it
/// through [`Validation::invalid`] or [`Validation::invalid_all`].
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<E, A> {
    Valid(A),
    Invalid(Vec<E>),
}

impl<E, A> Validation<E, A> {
    /// A successful result.
    pub fn valid(value: A) -> Self {
        Validation::Valid(value)
    }

    /// A failed result carrying a single error.
    pub fn invalid(error: E) -> Self {
        Validation::Invalid(vec![error])
    }

    /// A failed result carrying every error found so far.
    pub fn invalid_all(errors: Vec<E>) -> Self {
        debug_assert!(!errors.is_empty(), "Invalid requires at least one error");
        Validation::Invalid(errors)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    /// Transform the success value, leaving errors untouched.
    pub fn map<B, F>(self, f: F) -> Validation<E, B>
    where
        F: FnOnce(A) -> B,
    {
        match self {
            Validation::Valid(a) => Validation::Valid(f(a)),
            Validation::Invalid(errors) => Validation::Invalid(errors),
        }
    }

    /// Chain a dependent check. Unlike [`Validation::combine`] this is
    /// fail-fast: the second check only runs when the first succeeded. Used
    /// where the first value is a structural prerequisite of the second.
    pub fn and_then<B, F>(self, f: F) -> Validation<E, B>
    where
        F: FnOnce(A) -> Validation<E, B>,
    {
        match self {
            Validation::Valid(a) => f(a),
            Validation::Invalid(errors) => Validation::Invalid(errors),
        }
    }

    /// Combine two independent results. Both valid: apply `f`. Otherwise the
    /// error sequences concatenate in the order the inputs were supplied.
    pub fn combine<B, C, F>(self, other: Validation<E, B>, f: F) -> Validation<E, C>
    where
        F: FnOnce(A, B) -> C,
    {
        match (self, other) {
            (Validation::Valid(a), Validation::Valid(b)) => Validation::Valid(f(a, b)),
            (Validation::Invalid(mut ea), Validation::Invalid(eb)) => {
                ea.extend(eb);
                Validation::Invalid(ea)
            }
            (Validation::Invalid(ea), Validation::Valid(_)) => Validation::Invalid(ea),
            (Validation::Valid(_), Validation::Invalid(eb)) => Validation::Invalid(eb),
        }
    }

    /// Pair two independent results, accumulating errors from both.
    pub fn zip<B>(self, other: Validation<E, B>) -> Validation<E, (A, B)> {
        self.combine(other, |a, b| (a, b))
    }

    /// Fold a sequence of results left to right, preserving input order in
    /// the success case and accumulating all element errors in the failure
    /// case. There is no fail-fast: every element is inspected.
    pub fn collect<I>(results: I) -> Validation<E, Vec<A>>
    where
        I: IntoIterator<Item = Validation<E, A>>,
    {
        let mut values = Vec::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Validation::Valid(a) => values.push(a),
                Validation::Invalid(es) => errors.extend(es),
            }
        }
        if errors.is_empty() {
            Validation::Valid(values)
        } else {
            Validation::Invalid(errors)
        }
    }

    /// Consume the result, returning the accumulated errors (empty if valid).
    pub fn errors(self) -> Vec<E> {
        match self {
            Validation::Valid(_) => Vec::new(),
            Validation::Invalid(errors) => errors,
        }
    }

    pub fn into_result(self) -> Result<A, Vec<E>> {
        match self {
            Validation::Valid(a) => Ok(a),
            Validation::Invalid(errors) => Err(errors),
        }
    }
}
