/// A request to dispatch against the benchmark route table.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    request: TestRequest,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, request: TestRequest) -> Self {
        Self { name, group, request }
    }

    /// Matched by one of the first routes.
    pub fn early(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Early, request)
    }

    /// Matched by one of the last routes.
    pub fn late(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Late, request)
    }

    /// Matched by no route at all.
    pub fn miss(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Miss, request)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn request(&self) -> &TestRequest {
        &self.request
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestRequest {
    method: &'static str,
    path: &'static str,
}

impl TestRequest {
    pub const fn new(method: &'static str, path: &'static str) -> Self {
        Self { method, path }
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Early,
    Late,
    Miss,
}
